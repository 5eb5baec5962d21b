//! `facefind share` subcommands.

use anyhow::Result;
use std::sync::Arc;

use facefind_core::models::Share;
use facefind_core::ShareManager;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

type SqliteShares = ShareManager<Arc<SqliteStore>, Arc<SqliteStore>>;

async fn open_manager(config: &Config) -> Result<(Arc<SqliteStore>, SqliteShares)> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let manager = ShareManager::new(store.clone(), store.clone(), config.shares.policy());
    Ok((store, manager))
}

fn print_share(share: &Share) {
    println!("code:        {}", share.share_code);
    println!("event:       {}", share.event_id);
    println!("origin face: {}", share.origin_face_id);
    println!("created:     {}", share.created_at.to_rfc3339());
    println!("expires:     {}", share.expires_at.to_rfc3339());
    println!("downloads:   {}", share.downloads_count);
    println!("photos:      {}", share.selected_photo_ids.join(", "));
}

pub async fn run_share_create(
    config: &Config,
    event_id: &str,
    photo_ids: &[String],
    origin_face_id: Option<&str>,
) -> Result<()> {
    let (store, manager) = open_manager(config).await?;
    let share = manager.create(event_id, origin_face_id, photo_ids).await?;
    print_share(&share);
    store.pool().close().await;
    Ok(())
}

pub async fn run_share_get(config: &Config, code: &str) -> Result<()> {
    let (store, manager) = open_manager(config).await?;
    let share = manager.get(code).await?;
    print_share(&share);
    store.pool().close().await;
    Ok(())
}

pub async fn run_share_list(config: &Config, event_id: Option<&str>, limit: usize) -> Result<()> {
    let (store, manager) = open_manager(config).await?;
    let shares = manager.list(event_id, limit).await?;

    if shares.is_empty() {
        println!("No shares.");
    } else {
        println!(
            "{:<14} {:<16} {:<20} {:<8} {:>6} {:>9}",
            "CODE", "EVENT", "EXPIRES", "STATE", "PHOTOS", "DOWNLOADS"
        );
        for s in &shares {
            println!(
                "{:<14} {:<16} {:<20} {:<8} {:>6} {:>9}",
                s.share_code,
                s.event_id,
                s.expires_at.format("%Y-%m-%d %H:%M"),
                if s.is_expired { "expired" } else { "active" },
                s.photos_count,
                s.downloads_count
            );
        }
    }

    store.pool().close().await;
    Ok(())
}

pub async fn run_share_download(config: &Config, code: &str, photo_id: &str) -> Result<()> {
    let (store, manager) = open_manager(config).await?;
    let count = manager.track_download(code, photo_id).await?;
    println!("Share {} downloads: {}", code, count);
    store.pool().close().await;
    Ok(())
}
