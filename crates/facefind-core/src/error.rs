//! Error taxonomy shared by the face index and the share manager.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the core reports to its callers.
///
/// Validation errors are raised before any mutation, so an `Err` never
/// leaves a partially indexed face or a partially created share behind.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed embedding, empty selection, unknown photo reference,
    /// out-of-range threshold.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown share code.
    #[error("not found: {0}")]
    NotFound(String),

    /// The share exists but its deadline has passed.
    #[error("share {code} expired at {expired_at}")]
    Expired {
        code: String,
        expired_at: DateTime<Utc>,
    },

    /// Share code generation kept colliding.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage or I/O failure.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Machine-readable code used in API error bodies.
    ///
    /// `Conflict` is reported as `internal`: callers cannot act on it
    /// differently from any other server-side failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Expired { .. } => "expired",
            Self::Conflict(_) | Self::Internal(_) => "internal",
        }
    }
}
