//! Database schema migrations (idempotent).
//!
//! | Table | Key | Purpose |
//! |-------|-----|---------|
//! | `photos` | `photo_id` | Readiness catalog consulted by share creation |
//! | `faces` | `face_id` | Face records; indexed by event and photo |
//! | `shares` | `share_code` | Share records; the primary key is the code uniqueness constraint |
//!
//! Timestamps are stored as Unix microseconds.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photos (
            photo_id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS faces (
            face_id TEXT PRIMARY KEY,
            photo_id TEXT NOT NULL,
            event_id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            bbox_x INTEGER NOT NULL,
            bbox_y INTEGER NOT NULL,
            bbox_width INTEGER NOT NULL,
            bbox_height INTEGER NOT NULL,
            quality_score REAL NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shares (
            share_code TEXT PRIMARY KEY,
            event_id TEXT NOT NULL,
            origin_face_id TEXT NOT NULL,
            selected_photo_ids TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            downloads_count INTEGER NOT NULL DEFAULT 0 CHECK (downloads_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_faces_event_id ON faces(event_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_faces_photo_id ON faces(photo_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_photos_event_id ON photos(event_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_shares_expires_at ON shares(expires_at)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_shares_event_created ON shares(event_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
