//! Engine Configuration
//!
//! Loaded from a TOML file (`narrative.toml` unless `NARRATIVE_CONFIG` points
//! elsewhere). Every field has a default, so a missing file is fine.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::LoadError;
use crate::event::DEFAULT_MAX_CALL_DEPTH;

pub const DEFAULT_CONFIG_FILE: &str = "narrative.toml";
pub const CONFIG_ENV: &str = "NARRATIVE_CONFIG";
pub const RNG_SEED_ENV: &str = "NARRATIVE_RNG_SEED";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub content: ContentConfig,
    pub dialogue: DialogueConfig,
    pub engine: DispatchConfig,
    pub logging: LoggingConfig,
    pub save: SaveConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub events_dir: PathBuf,
    pub dialogue_dir: PathBuf,
    /// Reload dialogue when its files change
    pub hot_reload: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            events_dir: PathBuf::from("data/events"),
            dialogue_dir: PathBuf::from("data/dialogue/en"),
            hot_reload: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Initial variant mode (`base`, `expanded`, `concise`, `alt`, ...)
    pub mode: String,
    /// Fixed seed for `alt` selection; random when unset
    pub rng_seed: Option<u64>,
    pub player_name: String,
    pub rival_name: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            mode: "expanded".to_string(),
            rng_seed: None,
            player_name: "PLAYER".to_string(),
            rival_name: "RIVAL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_call_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "narrative_engine=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub path: PathBuf,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("saves/save1.json"),
        }
    }
}

impl EngineConfig {
    /// Load from `NARRATIVE_CONFIG` or the default file, then apply env overrides
    pub fn load() -> Result<Self, LoadError> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = Self::from_file(&path)?;
        config.apply_env();
        Ok(config)
    }

    /// Parse a config file; a missing file yields defaults
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content).map_err(|source| LoadError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// RNG for `alt` dialogue selection, seeded when configured
    pub fn dialogue_rng(&self) -> StdRng {
        match self.dialogue.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(seed) = std::env::var(RNG_SEED_ENV) {
            match seed.trim().parse::<u64>() {
                Ok(seed) => self.dialogue.rng_seed = Some(seed),
                Err(_) => warn!("Ignoring non-integer {}={}", RNG_SEED_ENV, seed),
            }
        }
    }
}
