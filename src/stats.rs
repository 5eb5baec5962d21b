//! Index and share statistics.
//!
//! Provides a quick summary of what's indexed: faces and photos per event,
//! plus share totals. Used by `facefind stats` to confirm that ingestion
//! is keeping up and shares are being used.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use facefind_core::store::FaceStore;
use facefind_core::ShareManager;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let manager = ShareManager::new(store.clone(), store.clone(), config.shares.policy());

    let events = store.face_stats().await?;
    let shares = manager.stats_at(Utc::now()).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    let total_faces: u64 = events.iter().map(|e| e.faces).sum();
    let total_photos: u64 = events.iter().map(|e| e.photos).sum();

    println!("facefind stats");
    println!("==============");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Events:      {}", events.len());
    println!("  Faces:       {}", total_faces);
    println!("  Photos:      {}", total_photos);
    println!();
    println!("  Shares:      {}", shares.total);
    println!("  Active:      {}", shares.total - shares.expired);
    println!("  Expired:     {}", shares.expired);
    println!("  Downloads:   {}", shares.downloads);

    if !events.is_empty() {
        println!();
        println!("  By event:");
        println!("  {:<32} {:>8} {:>8}", "EVENT", "FACES", "PHOTOS");
        println!("  {}", "-".repeat(50));
        for e in &events {
            println!("  {:<32} {:>8} {:>8}", e.event_id, e.faces, e.photos);
        }
    }

    println!();

    store.pool().close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
