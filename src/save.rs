//! Session Saves
//!
//! Snapshot of the mutable story state (flags and fired events) written as
//! JSON. Catalog and dialogue content are not part of a save.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::LoadError;
use crate::flags::FlagStore;

/// Flags and fired-set of one play session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub saved_at: DateTime<Utc>,
    pub flags: FlagStore,
    /// Ids of `once` events that already ran
    pub fired: BTreeSet<String>,
}

impl SessionSnapshot {
    pub fn new(flags: FlagStore, fired: BTreeSet<String>) -> Self {
        Self {
            saved_at: Utc::now(),
            flags,
            fired,
        }
    }
}

/// Write a snapshot, creating parent directories as needed
pub fn write(path: &Path, snapshot: &SessionSnapshot) -> Result<(), LoadError> {
    let io_error = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let json = serde_json::to_string_pretty(snapshot).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io_error)?;

    info!("Game saved to {:?}", path);
    Ok(())
}

/// Read a snapshot; a missing or unreadable save is `None`
pub fn read(path: &Path) -> Option<SessionSnapshot> {
    if !path.is_file() {
        return None;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read save {:?}: {}", path, e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!("Failed to parse save {:?}: {}", path, e);
            None
        }
    }
}
