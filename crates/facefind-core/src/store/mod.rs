//! Storage abstraction for facefind.
//!
//! Three traits cover everything the core needs from persistence:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`FaceStore`] | Per-event face records for the similarity index |
//! | [`ShareStore`] | Share records keyed by a unique code |
//! | [`PhotoCatalog`] | Readiness check for photos owned elsewhere |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Methods return `anyhow::Result`; the core converts storage failures
//! into [`Error::Internal`](crate::Error::Internal).

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{EventFaceStats, Face, Share, ShareStats};

/// Result of inserting a share under the `share_code` uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another share already holds this code; nothing was written.
    CodeTaken,
}

/// Face records for the similarity index.
#[async_trait]
pub trait FaceStore: Send + Sync {
    /// Insert a face or replace the record with the same `face_id`.
    async fn upsert_face(&self, face: &Face) -> Result<()>;

    /// Delete every face belonging to `photo_id`. Returns how many were
    /// removed; removing an unknown photo is not an error.
    async fn remove_photo_faces(&self, photo_id: &str) -> Result<u64>;

    /// Consistent snapshot of an event's faces. Unknown events yield an
    /// empty snapshot. Writes that land after the snapshot is taken are not
    /// reflected in it.
    async fn event_faces(&self, event_id: &str) -> Result<Arc<Vec<Face>>>;

    /// Face and photo counts per event, ordered by `event_id`.
    async fn face_stats(&self) -> Result<Vec<EventFaceStats>>;
}

/// Share records.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Insert a new share. Must be atomic with respect to code uniqueness:
    /// of two concurrent inserts with the same code, exactly one returns
    /// [`InsertOutcome::Inserted`].
    async fn insert_share(&self, share: &Share) -> Result<InsertOutcome>;

    async fn get_share(&self, share_code: &str) -> Result<Option<Share>>;

    /// Atomically add one to `downloads_count` and return the new value.
    ///
    /// The expiry check happens in the same atomic step as the increment:
    /// returns `None`, leaving the count untouched, if the code does not
    /// exist or `now` is past the share's `expires_at`.
    async fn increment_downloads(
        &self,
        share_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>>;

    /// Shares ordered by `created_at` descending, then `share_code`
    /// ascending.
    async fn list_shares(&self, event_id: Option<&str>, limit: usize) -> Result<Vec<Share>>;

    async fn share_stats(&self, now: DateTime<Utc>) -> Result<ShareStats>;
}

/// Readiness check against the photo catalog.
#[async_trait]
pub trait PhotoCatalog: Send + Sync {
    /// True iff the photo exists, belongs to `event_id`, and is ready.
    async fn is_ready(&self, event_id: &str, photo_id: &str) -> Result<bool>;
}

#[async_trait]
impl<T: FaceStore + ?Sized> FaceStore for Arc<T> {
    async fn upsert_face(&self, face: &Face) -> Result<()> {
        (**self).upsert_face(face).await
    }

    async fn remove_photo_faces(&self, photo_id: &str) -> Result<u64> {
        (**self).remove_photo_faces(photo_id).await
    }

    async fn event_faces(&self, event_id: &str) -> Result<Arc<Vec<Face>>> {
        (**self).event_faces(event_id).await
    }

    async fn face_stats(&self) -> Result<Vec<EventFaceStats>> {
        (**self).face_stats().await
    }
}

#[async_trait]
impl<T: ShareStore + ?Sized> ShareStore for Arc<T> {
    async fn insert_share(&self, share: &Share) -> Result<InsertOutcome> {
        (**self).insert_share(share).await
    }

    async fn get_share(&self, share_code: &str) -> Result<Option<Share>> {
        (**self).get_share(share_code).await
    }

    async fn increment_downloads(
        &self,
        share_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        (**self).increment_downloads(share_code, now).await
    }

    async fn list_shares(&self, event_id: Option<&str>, limit: usize) -> Result<Vec<Share>> {
        (**self).list_shares(event_id, limit).await
    }

    async fn share_stats(&self, now: DateTime<Utc>) -> Result<ShareStats> {
        (**self).share_stats(now).await
    }
}

#[async_trait]
impl<T: PhotoCatalog + ?Sized> PhotoCatalog for Arc<T> {
    async fn is_ready(&self, event_id: &str, photo_id: &str) -> Result<bool> {
        (**self).is_ready(event_id, photo_id).await
    }
}
