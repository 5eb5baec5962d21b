//! Face ingestion from the detection pipeline.
//!
//! The pipeline hands over face records as JSON Lines, one [`Face`] per
//! line. Each record is validated by [`FaceIndex::upsert`] before it is
//! written; the first malformed line aborts the run with its line number.
//! Records already written stay indexed, and re-running the same file is
//! idempotent since faces are keyed by `face_id`.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use facefind_core::models::{Face, PhotoStatus};
use facefind_core::FaceIndex;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Index every face record in a JSONL file.
pub async fn run_ingest(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read face file: {}", path.display()))?;

    let store = Arc::new(SqliteStore::open(config).await?);
    let index = FaceIndex::new(store.clone(), config.index.dims);

    let mut indexed = 0usize;
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let face: Face = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: malformed face record", path.display(), n + 1))?;
        index
            .upsert(&face)
            .await
            .with_context(|| format!("{}:{}: face {} rejected", path.display(), n + 1, face.face_id))?;
        indexed += 1;
    }

    info!(indexed, file = %path.display(), "face ingestion complete");
    println!("Indexed {} faces from {}", indexed, path.display());

    store.pool().close().await;
    Ok(())
}

/// Remove every face of a photo from the index.
pub async fn run_remove(config: &Config, photo_id: &str) -> Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let index = FaceIndex::new(store.clone(), config.index.dims);

    let removed = index.remove(photo_id).await?;
    println!("Removed {} faces of photo {}", removed, photo_id);

    store.pool().close().await;
    Ok(())
}

/// Register a photo in the catalog, or update its status.
pub async fn run_register_photo(
    config: &Config,
    event_id: &str,
    photo_id: &str,
    status: &str,
) -> Result<()> {
    let Some(status) = PhotoStatus::parse(status) else {
        bail!(
            "Unknown photo status: '{}'. Use pending, processing, ready, or error.",
            status
        );
    };
    if event_id.is_empty() || photo_id.is_empty() {
        bail!("event_id and photo_id must not be empty");
    }

    let store = SqliteStore::open(config).await?;
    store.register_photo(event_id, photo_id, status).await?;
    println!(
        "Photo {} registered in event {} as {}",
        photo_id,
        event_id,
        status.as_str()
    );

    store.pool().close().await;
    Ok(())
}
