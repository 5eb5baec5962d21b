//! # facefind core
//!
//! Storage-agnostic logic for facefind: data models, the error taxonomy,
//! store traits, the face similarity search, and the share lifecycle.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Backends
//! implement the traits in [`store`]; [`store::memory`] ships an in-memory
//! implementation used by tests.

pub mod embedding;
pub mod error;
pub mod models;
pub mod search;
pub mod share;
pub mod store;

pub use error::{Error, Result};
pub use search::FaceIndex;
pub use share::{ShareManager, SharePolicy};
