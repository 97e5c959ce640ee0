//! Error Types
//!
//! Load-time errors are fatal and abort startup. Engine errors propagate to
//! the caller of a dispatch. Recoverable runtime faults (unknown commands,
//! missing dialogue, unknown speakers) never become errors; they are logged
//! and replaced with a safe default where they occur.

use std::path::PathBuf;

/// Failure while loading content or configuration from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A catalog record violated the event schema.
    #[error("invalid event record {record} in {path:?}: {detail}")]
    Schema {
        path: PathBuf,
        /// Record index within the file, plus the id when it could be read
        record: String,
        detail: String,
    },

    #[error("duplicate event id '{id}' (first in {first:?}, again in {second:?})")]
    DuplicateIdentifier {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("invalid dialogue entry '{key}' in {path:?}: {detail}")]
    Dialogue {
        path: PathBuf,
        key: String,
        detail: String,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failure reported by a collaborator (inventory, UI, battle).
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("cannot remove {requested} x '{item}', only {have} held")]
    InventoryUnderflow { item: String, have: i64, requested: i64 },

    #[error("invalid quantity {qty} for item '{item}'")]
    InvalidQuantity { item: String, qty: i64 },

    #[error("ui: {0}")]
    Ui(String),

    #[error("battle: {0}")]
    Battle(String),
}

/// Failure while executing an event. Flags of the failing event are not
/// committed and it stays eligible.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("event call depth exceeded {depth} while invoking '{event_id}'")]
    CycleDetected { event_id: String, depth: usize },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}
