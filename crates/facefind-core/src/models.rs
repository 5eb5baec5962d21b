//! Core data models: faces, matches, and shares.
//!
//! All records are closed structures. Deserialization rejects unknown
//! fields so that loosely-shaped payloads fail at the boundary instead of
//! leaking into storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `origin_face_id` recorded for shares curated by hand rather than
/// produced from a face search.
pub const MANUAL_SELECTION: &str = "manual";

/// Face region inside its photo, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One detected face in one photo, as delivered by the detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Face {
    pub face_id: String,
    pub photo_id: String,
    /// Denormalized so queries can scope to an event without a join.
    pub event_id: String,
    pub embedding: Vec<f64>,
    pub bbox: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub quality_score: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Processing state of a photo, owned by the photo catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A single face that matched a query.
///
/// Results are per face, not per photo: a photo with two matching faces
/// yields two entries so callers can see which region matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub photo_id: String,
    pub face_id: String,
    /// Cosine similarity, full precision.
    pub similarity: f64,
    pub bbox: BoundingBox,
}

/// A time-bounded grant over a fixed set of photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Share {
    pub share_code: String,
    pub event_id: String,
    pub origin_face_id: String,
    /// Distinct ids in first-selected order.
    pub selected_photo_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub downloads_count: u64,
}

/// Lifecycle state of a share, derived from `expires_at` on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareState {
    Active,
    Expired,
}

impl Share {
    /// A share stays active up to and including its deadline.
    pub fn state_at(&self, now: DateTime<Utc>) -> ShareState {
        if now > self.expires_at {
            ShareState::Expired
        } else {
            ShareState::Active
        }
    }

    pub fn contains_photo(&self, photo_id: &str) -> bool {
        self.selected_photo_ids.iter().any(|p| p == photo_id)
    }
}

/// Listing row for the administrative share overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareSummary {
    pub share_code: String,
    pub event_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    pub photos_count: usize,
    pub downloads_count: u64,
}

impl ShareSummary {
    pub fn from_share(share: &Share, now: DateTime<Utc>) -> Self {
        Self {
            share_code: share.share_code.clone(),
            event_id: share.event_id.clone(),
            created_at: share.created_at,
            expires_at: share.expires_at,
            is_expired: share.state_at(now) == ShareState::Expired,
            photos_count: share.selected_photo_ids.len(),
            downloads_count: share.downloads_count,
        }
    }
}

/// Indexed face counts for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFaceStats {
    pub event_id: String,
    pub faces: u64,
    pub photos: u64,
}

/// Aggregate share counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShareStats {
    pub total: u64,
    pub expired: u64,
    pub downloads: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn share_expiring(expires_at: DateTime<Utc>) -> Share {
        Share {
            share_code: "CODE".into(),
            event_id: "e1".into(),
            origin_face_id: MANUAL_SELECTION.into(),
            selected_photo_ids: vec!["p1".into(), "p2".into()],
            created_at: expires_at - Duration::hours(48),
            expires_at,
            downloads_count: 0,
        }
    }

    #[test]
    fn test_share_active_at_deadline() {
        let deadline = Utc::now();
        let share = share_expiring(deadline);
        assert_eq!(share.state_at(deadline), ShareState::Active);
        assert_eq!(
            share.state_at(deadline + Duration::seconds(1)),
            ShareState::Expired
        );
    }

    #[test]
    fn test_face_rejects_unknown_fields() {
        let json = serde_json::json!({
            "face_id": "f1",
            "photo_id": "p1",
            "event_id": "e1",
            "embedding": [1.0, 0.0],
            "bbox": {"x": 0, "y": 0, "width": 10, "height": 10},
            "quality_score": 0.9,
            "landmarks": []
        });
        assert!(serde_json::from_value::<Face>(json).is_err());
    }

    #[test]
    fn test_face_created_at_defaults() {
        let json = serde_json::json!({
            "face_id": "f1",
            "photo_id": "p1",
            "event_id": "e1",
            "embedding": [1.0, 0.0],
            "bbox": {"x": 1, "y": 2, "width": 3, "height": 4},
            "quality_score": 0.5
        });
        let face: Face = serde_json::from_value(json).unwrap();
        assert_eq!(face.bbox, BoundingBox::new(1, 2, 3, 4));
    }

    #[test]
    fn test_photo_status_parse() {
        for status in [
            PhotoStatus::Pending,
            PhotoStatus::Processing,
            PhotoStatus::Ready,
            PhotoStatus::Error,
        ] {
            assert_eq!(PhotoStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PhotoStatus::parse("READY"), None);
    }

    #[test]
    fn test_summary_counts_photos() {
        let share = share_expiring(Utc::now() + Duration::hours(1));
        let summary = ShareSummary::from_share(&share, Utc::now());
        assert_eq!(summary.photos_count, 2);
        assert!(!summary.is_expired);
    }
}
