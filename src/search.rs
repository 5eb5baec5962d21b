use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use facefind_core::FaceIndex;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Query an event with an embedding read from a JSON file (a bare array
/// of numbers) and print the ranked matches.
pub async fn run_search(
    config: &Config,
    event_id: &str,
    embedding_path: &Path,
    min_similarity: Option<f64>,
) -> Result<()> {
    let content = std::fs::read_to_string(embedding_path).with_context(|| {
        format!("Failed to read embedding file: {}", embedding_path.display())
    })?;
    let embedding: Vec<f64> = serde_json::from_str(&content)
        .with_context(|| "Embedding file must contain a JSON array of numbers")?;

    let threshold = min_similarity.unwrap_or(config.index.min_similarity);

    let store = Arc::new(SqliteStore::open(config).await?);
    let index = FaceIndex::new(store.clone(), config.index.dims);
    let matches = index.query(event_id, &embedding, threshold).await?;

    if matches.is_empty() {
        println!("No matches.");
        store.pool().close().await;
        return Ok(());
    }

    println!(
        "{} matches in event {} (threshold {:.2}):",
        matches.len(),
        event_id,
        threshold
    );
    for (i, m) in matches.iter().enumerate() {
        println!(
            "{}. [{:.4}] photo {}  face {}  bbox {},{} {}x{}",
            i + 1,
            m.similarity,
            m.photo_id,
            m.face_id,
            m.bbox.x,
            m.bbox.y,
            m.bbox.width,
            m.bbox.height
        );
    }

    store.pool().close().await;
    Ok(())
}
