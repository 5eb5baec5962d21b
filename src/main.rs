//! # facefind CLI
//!
//! ## Usage
//!
//! ```bash
//! facefind --config ./config/facefind.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `facefind init` | Create the SQLite database and run schema migrations |
//! | `facefind serve` | Start the HTTP server |
//! | `facefind faces ingest <file>` | Index face records from a JSONL file |
//! | `facefind faces remove <photo_id>` | Drop every face of a photo |
//! | `facefind photos register <event> <photo>` | Add a photo to the catalog |
//! | `facefind search <event> --embedding <file>` | Rank an event's faces |
//! | `facefind share create <event> <photo>...` | Create a share |
//! | `facefind share get <code>` | Show an active share |
//! | `facefind share list` | Newest-first share overview |
//! | `facefind share download <code> <photo>` | Count a download |
//! | `facefind stats` | Index and share statistics |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use facefind::{config, ingest, migrate, search, server, share_cmd, stats};

/// facefind: face search over event photos with expiring share links.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/facefind.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "facefind",
    about = "Face search over event photos with expiring share links",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/facefind.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the photos, faces, and shares
    /// tables. Running it multiple times is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Manage indexed faces.
    Faces {
        #[command(subcommand)]
        action: FacesAction,
    },

    /// Manage the photo catalog.
    Photos {
        #[command(subcommand)]
        action: PhotosAction,
    },

    /// Rank an event's faces by similarity to an embedding.
    Search {
        event_id: String,

        /// JSON file holding the query embedding as an array of numbers.
        #[arg(long)]
        embedding: PathBuf,

        /// Minimum cosine similarity in [0, 1]. Defaults to `[index].min_similarity`.
        #[arg(long)]
        min_similarity: Option<f64>,
    },

    /// Create, inspect, and count downloads of shares.
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },

    /// Show index and share statistics.
    Stats,
}

#[derive(Subcommand)]
enum FacesAction {
    /// Index face records from a JSON Lines file (one face per line).
    Ingest { path: PathBuf },
    /// Remove every face of a photo.
    Remove { photo_id: String },
}

#[derive(Subcommand)]
enum PhotosAction {
    /// Register a photo or update its status.
    Register {
        event_id: String,
        photo_id: String,
        /// One of `pending`, `processing`, `ready`, `error`.
        #[arg(long, default_value = "ready")]
        status: String,
    },
}

#[derive(Subcommand)]
enum ShareAction {
    /// Create a share over ready photos of an event.
    Create {
        event_id: String,
        #[arg(required = true)]
        photo_ids: Vec<String>,
        /// Face the selection was found from. Omit for a manual selection.
        #[arg(long)]
        origin_face: Option<String>,
    },
    /// Show an active share.
    Get { code: String },
    /// List shares, newest first.
    List {
        #[arg(long)]
        event: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Count one download of a photo through a share.
    Download { code: String, photo_id: String },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("facefind=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Faces { action } => match action {
            FacesAction::Ingest { path } => {
                ingest::run_ingest(&cfg, &path).await?;
            }
            FacesAction::Remove { photo_id } => {
                ingest::run_remove(&cfg, &photo_id).await?;
            }
        },
        Commands::Photos { action } => match action {
            PhotosAction::Register {
                event_id,
                photo_id,
                status,
            } => {
                ingest::run_register_photo(&cfg, &event_id, &photo_id, &status).await?;
            }
        },
        Commands::Search {
            event_id,
            embedding,
            min_similarity,
        } => {
            search::run_search(&cfg, &event_id, &embedding, min_similarity).await?;
        }
        Commands::Share { action } => match action {
            ShareAction::Create {
                event_id,
                photo_ids,
                origin_face,
            } => {
                share_cmd::run_share_create(&cfg, &event_id, &photo_ids, origin_face.as_deref())
                    .await?;
            }
            ShareAction::Get { code } => {
                share_cmd::run_share_get(&cfg, &code).await?;
            }
            ShareAction::List { event, limit } => {
                share_cmd::run_share_list(&cfg, event.as_deref(), limit).await?;
            }
            ShareAction::Download { code, photo_id } => {
                share_cmd::run_share_download(&cfg, &code, &photo_id).await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
