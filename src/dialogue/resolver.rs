//! Dialogue Resolver
//!
//! Loads localized dialogue from JSON files and turns a text id into display
//! text for the current mode. Resolution never fails: unknown ids and
//! speakers are logged and replaced with placeholders.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::variant::DialogueEntry;
use crate::content;
use crate::error::LoadError;

/// Speaker display names live in this file instead of being dialogue
pub const CHARACTERS_FILE: &str = "characters.json";
const IGNORED_FILES: &[&str] = &["selector_config.json"];

/// Resolves text ids to display strings
pub struct DialogueResolver {
    /// Directory reloaded by [`DialogueResolver::reload`]
    dialogue_dir: Option<PathBuf>,
    entries: HashMap<String, DialogueEntry>,
    /// speaker key -> display name
    characters: HashMap<String, String>,
    /// `{NAME}` -> replacement
    placeholders: BTreeMap<String, String>,
    mode: String,
    rng: StdRng,
}

/// Parsed contents of a dialogue directory
struct LoadedDialogue {
    entries: HashMap<String, DialogueEntry>,
    characters: HashMap<String, String>,
}

impl DialogueResolver {
    /// An empty resolver, for content supplied programmatically
    pub fn new(mode: &str, rng: StdRng) -> Self {
        Self {
            dialogue_dir: None,
            entries: HashMap::new(),
            characters: HashMap::new(),
            placeholders: BTreeMap::new(),
            mode: mode.to_string(),
            rng,
        }
    }

    /// Load every dialogue file under `dialogue_dir`
    pub fn load_from_directory(dialogue_dir: &Path, mode: &str, rng: StdRng) -> Result<Self, LoadError> {
        let mut resolver = Self::new(mode, rng);
        resolver.dialogue_dir = Some(dialogue_dir.to_path_buf());
        resolver.reload()?;
        Ok(resolver)
    }

    /// Re-read the dialogue directory. On error the current content is kept.
    pub fn reload(&mut self) -> Result<usize, LoadError> {
        let Some(dir) = self.dialogue_dir.clone() else {
            return Ok(self.entries.len());
        };

        let loaded = load_dialogue_dir(&dir)?;
        self.entries = loaded.entries;
        self.characters = loaded.characters;

        info!(
            "Loaded {} dialogue entries and {} speaker names from {:?}",
            self.entries.len(),
            self.characters.len(),
            dir
        );
        Ok(self.entries.len())
    }

    /// Add or replace one entry
    pub fn insert(&mut self, entry: DialogueEntry) {
        if self.entries.contains_key(&entry.key) {
            warn!("Duplicate dialogue key '{}', overwriting", entry.key);
        }
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn insert_character(&mut self, key: &str, display_name: &str) {
        self.characters.insert(key.to_string(), display_name.to_string());
    }

    pub fn set_mode(&mut self, mode: &str) {
        debug!("Dialogue mode {} -> {}", self.mode, mode);
        self.mode = mode.to_string();
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Register a `{NAME}` placeholder substituted into resolved text
    pub fn set_placeholder(&mut self, name: &str, value: &str) {
        self.placeholders.insert(name.to_string(), value.to_string());
    }

    /// Resolve with the current mode
    pub fn resolve(&mut self, text_id: &str) -> String {
        self.resolve_with(text_id, None)
    }

    /// Resolve, optionally overriding the mode for this call only
    pub fn resolve_with(&mut self, text_id: &str, mode: Option<&str>) -> String {
        let Some(entry) = self.entries.get(text_id) else {
            warn!("Missing dialogue key '{}'", text_id);
            return format!("[missing:{}]", text_id);
        };

        let mode = mode.unwrap_or(self.mode.as_str());
        let text = entry.select(mode, &mut self.rng);
        self.fill_placeholders(text)
    }

    /// Display name for a speaker key; unknown keys are shown as-is
    pub fn speaker_name(&self, key: &str) -> String {
        match self.characters.get(key) {
            Some(name) => self.fill_placeholders(name),
            None => {
                warn!("Unknown speaker '{}'", key);
                key.to_string()
            }
        }
    }

    pub fn contains(&self, text_id: &str) -> bool {
        self.entries.contains_key(text_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fill_placeholders(&self, text: &str) -> String {
        self.placeholders
            .iter()
            .fold(text.to_string(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
    }
}

fn load_dialogue_dir(dir: &Path) -> Result<LoadedDialogue, LoadError> {
    let mut loaded = LoadedDialogue {
        entries: HashMap::new(),
        characters: HashMap::new(),
    };

    if !dir.exists() {
        warn!("Dialogue directory does not exist: {:?}", dir);
        return Ok(loaded);
    }

    for path in content::json_files(dir)? {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_default();
        if IGNORED_FILES.contains(&file_name.as_str()) {
            continue;
        }

        let document = content::read_json(&path)?;
        let Value::Object(table) = document else {
            return Err(LoadError::Dialogue {
                path: path.clone(),
                key: "<root>".to_string(),
                detail: "top level must be an object".to_string(),
            });
        };

        if file_name == CHARACTERS_FILE {
            for (key, name) in table {
                if key.starts_with('_') {
                    continue;
                }
                let Some(name) = name.as_str() else {
                    return Err(LoadError::Dialogue {
                        path: path.clone(),
                        key,
                        detail: "speaker name must be a string".to_string(),
                    });
                };
                loaded.characters.insert(key, name.to_string());
            }
            continue;
        }

        for (key, value) in table {
            // Authoring comments
            if key.starts_with('_') {
                continue;
            }

            let entry = DialogueEntry::from_json(&key, &value).map_err(|detail| LoadError::Dialogue {
                path: path.clone(),
                key: key.clone(),
                detail,
            })?;

            if loaded.entries.contains_key(&key) {
                warn!("Duplicate dialogue key '{}' in {:?}, overwriting", key, path);
            }
            loaded.entries.insert(key, entry);
        }
    }

    Ok(loaded)
}
