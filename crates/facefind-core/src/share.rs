//! Share lifecycle: mint, read, and count downloads of time-bounded links.
//!
//! A share binds a deduplicated selection of ready photos to a random
//! code. Its state is derived from `expires_at` on every read; nothing
//! sweeps expired shares for correctness.
//!
//! Every operation has an `*_at` variant taking `now` explicitly; the
//! plain variants use the wall clock.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{Share, ShareState, ShareStats, ShareSummary, MANUAL_SELECTION};
use crate::store::{InsertOutcome, PhotoCatalog, ShareStore};

/// Shortest code accepted by [`SharePolicy`]: 9 alphanumeric characters
/// carry ~53.6 bits of entropy.
pub const MIN_CODE_LENGTH: usize = 9;

/// Maximum page size for [`ShareManager::list`].
pub const MAX_LIST_LIMIT: usize = 100;

/// Produces a candidate share code of the requested length.
pub type CodeSource = Arc<dyn Fn(usize) -> String + Send + Sync>;

/// Tunables for share creation.
#[derive(Debug, Clone)]
pub struct SharePolicy {
    /// How long a share stays active after creation.
    pub validity: Duration,
    pub code_length: usize,
    /// Insert attempts before giving up on a fresh code.
    pub max_code_attempts: u32,
}

impl Default for SharePolicy {
    fn default() -> Self {
        Self {
            validity: Duration::hours(48),
            code_length: 12,
            max_code_attempts: 5,
        }
    }
}

/// Cryptographically random alphanumeric code (`[A-Za-z0-9]`).
///
/// `thread_rng` is a CSPRNG reseeded from the OS, so codes cannot be
/// predicted from earlier ones.
pub fn random_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Remove duplicates, keeping the first occurrence of each id.
pub fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Creates and serves shares over a [`ShareStore`], checking photo
/// readiness through a [`PhotoCatalog`].
pub struct ShareManager<S, P> {
    store: S,
    catalog: P,
    policy: SharePolicy,
    codes: CodeSource,
}

impl<S: ShareStore, P: PhotoCatalog> ShareManager<S, P> {
    pub fn new(store: S, catalog: P, policy: SharePolicy) -> Self {
        Self {
            store,
            catalog,
            policy,
            codes: Arc::new(random_code),
        }
    }

    /// Replace the code generator. Used to exercise collision handling.
    pub fn with_code_source(mut self, codes: CodeSource) -> Self {
        self.codes = codes;
        self
    }

    pub fn policy(&self) -> &SharePolicy {
        &self.policy
    }

    pub async fn create(
        &self,
        event_id: &str,
        origin_face_id: Option<&str>,
        photo_ids: &[String],
    ) -> Result<Share> {
        self.create_at(event_id, origin_face_id, photo_ids, Utc::now())
            .await
    }

    /// Mint a share over `photo_ids`.
    ///
    /// Every photo must be ready and belong to `event_id`; otherwise
    /// nothing is written and `InvalidInput` lists the offending ids.
    /// A code collision triggers a retry with a fresh code, up to
    /// `max_code_attempts` inserts in total.
    #[instrument(skip(self, photo_ids), fields(photos = photo_ids.len()))]
    pub async fn create_at(
        &self,
        event_id: &str,
        origin_face_id: Option<&str>,
        photo_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Share> {
        if event_id.is_empty() {
            return Err(Error::invalid("event_id must not be empty"));
        }
        if photo_ids.is_empty() {
            return Err(Error::invalid("photo selection must not be empty"));
        }
        if photo_ids.iter().any(|id| id.is_empty()) {
            return Err(Error::invalid("photo ids must not be empty"));
        }

        let selected = dedup_preserving_order(photo_ids);

        let mut rejected = Vec::new();
        for photo_id in &selected {
            if !self.catalog.is_ready(event_id, photo_id).await? {
                rejected.push(photo_id.as_str());
            }
        }
        if !rejected.is_empty() {
            warn!(event_id, rejected = ?rejected, "share rejected: photos not ready");
            return Err(Error::invalid(format!(
                "photos not found, not ready, or not in event {}: {}",
                event_id,
                rejected.join(", ")
            )));
        }

        let origin_face_id = origin_face_id
            .filter(|f| !f.is_empty())
            .unwrap_or(MANUAL_SELECTION)
            .to_string();

        let mut last_failure: Option<anyhow::Error> = None;
        for attempt in 1..=self.policy.max_code_attempts {
            let share = Share {
                share_code: (self.codes)(self.policy.code_length),
                event_id: event_id.to_string(),
                origin_face_id: origin_face_id.clone(),
                selected_photo_ids: selected.clone(),
                created_at: now,
                expires_at: now + self.policy.validity,
                downloads_count: 0,
            };

            match self.store.insert_share(&share).await {
                Ok(InsertOutcome::Inserted) => {
                    info!(
                        share_code = %share.share_code,
                        expires_at = %share.expires_at,
                        "share created"
                    );
                    return Ok(share);
                }
                Ok(InsertOutcome::CodeTaken) => {
                    warn!(attempt, "share code collision, retrying");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "share insert failed, retrying");
                    last_failure = Some(e);
                }
            }
        }

        match last_failure {
            Some(e) => Err(Error::Internal(e.context(format!(
                "share insert failed after {} attempts",
                self.policy.max_code_attempts
            )))),
            None => Err(Error::Conflict(format!(
                "no unique share code after {} attempts",
                self.policy.max_code_attempts
            ))),
        }
    }

    pub async fn get(&self, share_code: &str) -> Result<Share> {
        self.get_at(share_code, Utc::now()).await
    }

    /// Fetch an active share. Unknown codes are `NotFound`; codes past
    /// their deadline are `Expired`.
    #[instrument(skip(self))]
    pub async fn get_at(&self, share_code: &str, now: DateTime<Utc>) -> Result<Share> {
        let share = self
            .store
            .get_share(share_code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("share {}", share_code)))?;

        match share.state_at(now) {
            ShareState::Active => Ok(share),
            ShareState::Expired => Err(Error::Expired {
                code: share.share_code,
                expired_at: share.expires_at,
            }),
        }
    }

    pub async fn track_download(&self, share_code: &str, photo_id: &str) -> Result<u64> {
        self.track_download_at(share_code, photo_id, Utc::now())
            .await
    }

    /// Count one download of `photo_id` through an active share and return
    /// the new `downloads_count`.
    #[instrument(skip(self))]
    pub async fn track_download_at(
        &self,
        share_code: &str,
        photo_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let share = self.get_at(share_code, now).await?;
        if !share.contains_photo(photo_id) {
            return Err(Error::invalid(format!(
                "photo {} is not part of share {}",
                photo_id, share_code
            )));
        }

        // Shares are never deleted, so a refused increment means the
        // deadline passed after the read above.
        self.store
            .increment_downloads(share_code, now)
            .await?
            .ok_or_else(|| Error::Expired {
                code: share.share_code,
                expired_at: share.expires_at,
            })
    }

    pub async fn list(&self, event_id: Option<&str>, limit: usize) -> Result<Vec<ShareSummary>> {
        self.list_at(event_id, limit, Utc::now()).await
    }

    /// Newest-first overview of shares, expired ones included.
    pub async fn list_at(
        &self,
        event_id: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ShareSummary>> {
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(Error::invalid(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIST_LIMIT, limit
            )));
        }
        let shares = self.store.list_shares(event_id, limit).await?;
        Ok(shares
            .iter()
            .map(|s| ShareSummary::from_share(s, now))
            .collect())
    }

    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<ShareStats> {
        Ok(self.store.share_stats(now).await?)
    }
}
