//! Flag Store
//!
//! Session-wide story flags. Unknown flags read as false; clearing a flag
//! stores `false` rather than removing the key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Boolean story flags plus a few named string values (e.g. the chosen starter)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagStore {
    flags: BTreeMap<String, bool>,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

impl FlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a flag; absent flags are false
    pub fn get(&self, flag: &str) -> bool {
        self.flags.get(flag).copied().unwrap_or(false)
    }

    pub fn set(&mut self, flag: &str, value: bool) {
        debug!("Flag {} = {}", flag, value);
        self.flags.insert(flag.to_string(), value);
    }

    /// Store a string value under `name` and raise the boolean flag of the same name
    pub fn set_value(&mut self, name: &str, value: &str) {
        debug!("Flag value {} = {}", name, value);
        self.values.insert(name.to_string(), value.to_string());
        self.flags.insert(name.to_string(), true);
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Names of all flags currently true, sorted
    pub fn raised(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, v)| **v)
            .map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
