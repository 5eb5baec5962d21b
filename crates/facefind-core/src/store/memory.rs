//! In-memory store implementation for tests and embedding into other
//! processes.
//!
//! Faces are kept per event as copy-on-write `Arc<Vec<Face>>` snapshots:
//! a query clones the `Arc` and scans without holding any lock. A writer
//! mutates through `Arc::make_mut`, which edits in place when no query
//! holds the snapshot and copies it once otherwise. Shares and photos live in
//! plain maps behind `std::sync::RwLock`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{EventFaceStats, Face, PhotoStatus, Share, ShareStats};

use super::{FaceStore, InsertOutcome, PhotoCatalog, ShareStore};

#[derive(Default)]
struct FaceTables {
    by_event: HashMap<String, Arc<Vec<Face>>>,
    /// face_id -> event_id, so a replaced face can move between events.
    event_of_face: HashMap<String, String>,
}

struct StoredPhoto {
    event_id: String,
    status: PhotoStatus,
}

/// In-memory [`FaceStore`], [`ShareStore`] and [`PhotoCatalog`].
#[derive(Default)]
pub struct InMemoryStore {
    faces: RwLock<FaceTables>,
    shares: RwLock<HashMap<String, Share>>,
    photos: RwLock<HashMap<String, StoredPhoto>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| anyhow!("in-memory store lock poisoned"))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update a photo in the catalog.
    pub fn register_photo(&self, event_id: &str, photo_id: &str, status: PhotoStatus) -> Result<()> {
        write(&self.photos)?.insert(
            photo_id.to_string(),
            StoredPhoto {
                event_id: event_id.to_string(),
                status,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl FaceStore for InMemoryStore {
    async fn upsert_face(&self, face: &Face) -> Result<()> {
        let mut tables = write(&self.faces)?;

        if let Some(previous_event) = tables.event_of_face.get(&face.face_id).cloned() {
            if previous_event != face.event_id {
                if let Some(snapshot) = tables.by_event.get_mut(&previous_event) {
                    Arc::make_mut(snapshot).retain(|f| f.face_id != face.face_id);
                }
            }
        }

        let snapshot = tables.by_event.entry(face.event_id.clone()).or_default();
        let faces = Arc::make_mut(snapshot);
        match faces.iter_mut().find(|f| f.face_id == face.face_id) {
            Some(existing) => *existing = face.clone(),
            None => faces.push(face.clone()),
        }

        tables
            .event_of_face
            .insert(face.face_id.clone(), face.event_id.clone());
        Ok(())
    }

    async fn remove_photo_faces(&self, photo_id: &str) -> Result<u64> {
        let mut tables = write(&self.faces)?;
        let mut removed_ids = Vec::new();

        for snapshot in tables.by_event.values_mut() {
            if !snapshot.iter().any(|f| f.photo_id == photo_id) {
                continue;
            }
            Arc::make_mut(snapshot).retain(|f| {
                if f.photo_id == photo_id {
                    removed_ids.push(f.face_id.clone());
                    false
                } else {
                    true
                }
            });
        }

        for id in &removed_ids {
            tables.event_of_face.remove(id);
        }
        tables.by_event.retain(|_, faces| !faces.is_empty());
        Ok(removed_ids.len() as u64)
    }

    async fn event_faces(&self, event_id: &str) -> Result<Arc<Vec<Face>>> {
        let tables = read(&self.faces)?;
        Ok(tables.by_event.get(event_id).cloned().unwrap_or_default())
    }

    async fn face_stats(&self) -> Result<Vec<EventFaceStats>> {
        let tables = read(&self.faces)?;
        let ordered: BTreeMap<&String, &Arc<Vec<Face>>> = tables.by_event.iter().collect();
        Ok(ordered
            .into_iter()
            .map(|(event_id, faces)| {
                let photos: HashSet<&str> = faces.iter().map(|f| f.photo_id.as_str()).collect();
                EventFaceStats {
                    event_id: event_id.clone(),
                    faces: faces.len() as u64,
                    photos: photos.len() as u64,
                }
            })
            .collect())
    }
}

#[async_trait]
impl ShareStore for InMemoryStore {
    async fn insert_share(&self, share: &Share) -> Result<InsertOutcome> {
        let mut shares = write(&self.shares)?;
        if shares.contains_key(&share.share_code) {
            return Ok(InsertOutcome::CodeTaken);
        }
        shares.insert(share.share_code.clone(), share.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_share(&self, share_code: &str) -> Result<Option<Share>> {
        Ok(read(&self.shares)?.get(share_code).cloned())
    }

    async fn increment_downloads(
        &self,
        share_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        let mut shares = write(&self.shares)?;
        Ok(shares
            .get_mut(share_code)
            .filter(|share| now <= share.expires_at)
            .map(|share| {
                share.downloads_count += 1;
                share.downloads_count
            }))
    }

    async fn list_shares(&self, event_id: Option<&str>, limit: usize) -> Result<Vec<Share>> {
        let shares = read(&self.shares)?;
        let mut listed: Vec<Share> = shares
            .values()
            .filter(|s| event_id.map_or(true, |e| s.event_id == e))
            .cloned()
            .collect();
        listed.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.share_code.cmp(&b.share_code))
        });
        listed.truncate(limit);
        Ok(listed)
    }

    async fn share_stats(&self, now: DateTime<Utc>) -> Result<ShareStats> {
        let shares = read(&self.shares)?;
        let mut stats = ShareStats::default();
        for share in shares.values() {
            stats.total += 1;
            if now > share.expires_at {
                stats.expired += 1;
            }
            stats.downloads += share.downloads_count;
        }
        Ok(stats)
    }
}

#[async_trait]
impl PhotoCatalog for InMemoryStore {
    async fn is_ready(&self, event_id: &str, photo_id: &str) -> Result<bool> {
        let photos = read(&self.photos)?;
        Ok(photos
            .get(photo_id)
            .is_some_and(|p| p.event_id == event_id && p.status == PhotoStatus::Ready))
    }
}
