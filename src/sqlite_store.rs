//! SQLite-backed store implementing every core storage trait.
//!
//! - [`FaceStore`]: one row per face, embeddings as little-endian `f64`
//!   BLOBs. A query snapshot is a single `SELECT`, so it never observes a
//!   half-written face.
//! - [`ShareStore`]: the `share_code` primary key is the uniqueness
//!   constraint; download counts use an in-place `UPDATE … RETURNING`.
//! - [`PhotoCatalog`]: the `photos` table.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use facefind_core::embedding::{blob_to_vec, vec_to_blob};
use facefind_core::models::{
    BoundingBox, EventFaceStats, Face, PhotoStatus, Share, ShareStats,
};
use facefind_core::store::{FaceStore, InsertOutcome, PhotoCatalog, ShareStore};

use crate::config::Config;
use crate::db;

/// SQLite implementation of the core store traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database. The schema must already exist
    /// (`facefind init`).
    pub async fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a photo or update its event and status.
    pub async fn register_photo(
        &self,
        event_id: &str,
        photo_id: &str,
        status: PhotoStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO photos (photo_id, event_id, status, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(photo_id) DO UPDATE SET
                event_id = excluded.event_id,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(photo_id)
        .bind(event_id)
        .bind(status.as_str())
        .bind(to_micros(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(us: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).ok_or_else(|| anyhow!("timestamp out of range: {}", us))
}

fn column_u32(row: &SqliteRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).with_context(|| format!("{} out of range: {}", column, value))
}

fn face_from_row(row: &SqliteRow) -> Result<Face> {
    let blob: Vec<u8> = row.try_get("embedding")?;
    Ok(Face {
        face_id: row.try_get("face_id")?,
        photo_id: row.try_get("photo_id")?,
        event_id: row.try_get("event_id")?,
        embedding: blob_to_vec(&blob),
        bbox: BoundingBox {
            x: column_u32(row, "bbox_x")?,
            y: column_u32(row, "bbox_y")?,
            width: column_u32(row, "bbox_width")?,
            height: column_u32(row, "bbox_height")?,
        },
        quality_score: row.try_get("quality_score")?,
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}

fn share_from_row(row: &SqliteRow) -> Result<Share> {
    let selected: String = row.try_get("selected_photo_ids")?;
    let downloads: i64 = row.try_get("downloads_count")?;
    Ok(Share {
        share_code: row.try_get("share_code")?,
        event_id: row.try_get("event_id")?,
        origin_face_id: row.try_get("origin_face_id")?,
        selected_photo_ids: serde_json::from_str(&selected)
            .context("corrupt selected_photo_ids column")?,
        created_at: from_micros(row.try_get("created_at")?)?,
        expires_at: from_micros(row.try_get("expires_at")?)?,
        downloads_count: u64::try_from(downloads)?,
    })
}

const SHARE_COLUMNS: &str = "share_code, event_id, origin_face_id, selected_photo_ids, \
                             created_at, expires_at, downloads_count";

#[async_trait]
impl FaceStore for SqliteStore {
    async fn upsert_face(&self, face: &Face) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO faces (face_id, photo_id, event_id, embedding,
                               bbox_x, bbox_y, bbox_width, bbox_height,
                               quality_score, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(face_id) DO UPDATE SET
                photo_id = excluded.photo_id,
                event_id = excluded.event_id,
                embedding = excluded.embedding,
                bbox_x = excluded.bbox_x,
                bbox_y = excluded.bbox_y,
                bbox_width = excluded.bbox_width,
                bbox_height = excluded.bbox_height,
                quality_score = excluded.quality_score,
                created_at = excluded.created_at
            "#,
        )
        .bind(&face.face_id)
        .bind(&face.photo_id)
        .bind(&face.event_id)
        .bind(vec_to_blob(&face.embedding))
        .bind(i64::from(face.bbox.x))
        .bind(i64::from(face.bbox.y))
        .bind(i64::from(face.bbox.width))
        .bind(i64::from(face.bbox.height))
        .bind(face.quality_score)
        .bind(to_micros(face.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_photo_faces(&self, photo_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM faces WHERE photo_id = ?")
            .bind(photo_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn event_faces(&self, event_id: &str) -> Result<Arc<Vec<Face>>> {
        let rows = sqlx::query(
            r#"
            SELECT face_id, photo_id, event_id, embedding, bbox_x, bbox_y,
                   bbox_width, bbox_height, quality_score, created_at
            FROM faces
            WHERE event_id = ?
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let faces = rows.iter().map(face_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(faces))
    }

    async fn face_stats(&self) -> Result<Vec<EventFaceStats>> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, COUNT(*) AS faces, COUNT(DISTINCT photo_id) AS photos
            FROM faces
            GROUP BY event_id
            ORDER BY event_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let faces: i64 = row.try_get("faces")?;
                let photos: i64 = row.try_get("photos")?;
                Ok(EventFaceStats {
                    event_id: row.try_get("event_id")?,
                    faces: u64::try_from(faces)?,
                    photos: u64::try_from(photos)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ShareStore for SqliteStore {
    async fn insert_share(&self, share: &Share) -> Result<InsertOutcome> {
        let selected = serde_json::to_string(&share.selected_photo_ids)?;
        let result = sqlx::query(
            r#"
            INSERT INTO shares (share_code, event_id, origin_face_id, selected_photo_ids,
                                created_at, expires_at, downloads_count)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&share.share_code)
        .bind(&share.event_id)
        .bind(&share.origin_face_id)
        .bind(selected)
        .bind(to_micros(share.created_at))
        .bind(to_micros(share.expires_at))
        .bind(i64::try_from(share.downloads_count)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(InsertOutcome::CodeTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_share(&self, share_code: &str) -> Result<Option<Share>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM shares WHERE share_code = ?",
            SHARE_COLUMNS
        ))
        .bind(share_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(share_from_row).transpose()
    }

    async fn increment_downloads(
        &self,
        share_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE shares
            SET downloads_count = downloads_count + 1
            WHERE share_code = ? AND expires_at >= ?
            RETURNING downloads_count
            "#,
        )
        .bind(share_code)
        .bind(to_micros(now))
        .fetch_optional(&self.pool)
        .await?;

        count.map(|c| u64::try_from(c).map_err(Into::into)).transpose()
    }

    async fn list_shares(&self, event_id: Option<&str>, limit: usize) -> Result<Vec<Share>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM shares
            WHERE (? IS NULL OR event_id = ?)
            ORDER BY created_at DESC, share_code ASC
            LIMIT ?
            "#,
            SHARE_COLUMNS
        ))
        .bind(event_id)
        .bind(event_id)
        .bind(i64::try_from(limit)?)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(share_from_row).collect()
    }

    async fn share_stats(&self, now: DateTime<Utc>) -> Result<ShareStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN expires_at < ? THEN 1 ELSE 0 END), 0) AS expired,
                   COALESCE(SUM(downloads_count), 0) AS downloads
            FROM shares
            "#,
        )
        .bind(to_micros(now))
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let expired: i64 = row.try_get("expired")?;
        let downloads: i64 = row.try_get("downloads")?;
        Ok(ShareStats {
            total: u64::try_from(total)?,
            expired: u64::try_from(expired)?,
            downloads: u64::try_from(downloads)?,
        })
    }
}

#[async_trait]
impl PhotoCatalog for SqliteStore {
    async fn is_ready(&self, event_id: &str, photo_id: &str) -> Result<bool> {
        let ready: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM photos WHERE photo_id = ? AND event_id = ? AND status = 'ready'",
        )
        .bind(photo_id)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(ready)
    }
}
