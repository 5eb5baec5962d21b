//! # facefind
//!
//! Find your photos from an event by face, then hand them off through an
//! expiring share link.
//!
//! The detection pipeline delivers one embedding per detected face. A
//! guest submits an embedding of their own face, gets back the photos of
//! that event whose faces are similar enough, picks some, and receives a
//! short random code that unlocks those photos for 48 hours.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Detection  │──▶│  FaceIndex    │──▶│  SQLite   │
//! │  pipeline   │   │ ShareManager │   │ WAL pool  │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! The similarity and share logic lives in the `facefind-core` crate and
//! is storage-agnostic; this crate supplies the SQLite store, the CLI, and
//! the HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core store traits |
//! | [`ingest`] | Face ingestion and photo registration |
//! | [`search`] | CLI face search |
//! | [`share_cmd`] | CLI share commands |
//! | [`stats`] | Index and share statistics |
//! | [`server`] | HTTP server |

pub mod config;
pub mod db;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod server;
pub mod share_cmd;
pub mod sqlite_store;
pub mod stats;
