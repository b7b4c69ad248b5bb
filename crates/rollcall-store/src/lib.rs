//! Key-value persistence and the two append-only collections built on it.
//!
//! Provides a trait-based KV store interface with an in-memory
//! implementation for testing and a JSON-document file implementation
//! for persistence, plus the face registry and attendance log
//! repositories and the plain-text report renderer.

pub mod attendance;
pub mod kv;
pub mod registry;
pub mod report;

use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

pub use attendance::AttendanceLog;
pub use kv::{JsonFileStore, KvStore, MemoryStore};
pub use registry::FaceRegistry;
pub use report::render_report;
