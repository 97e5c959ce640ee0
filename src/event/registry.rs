//! Event Registry
//!
//! Loads the JSON event catalog, validates every record, and indexes events
//! by trigger type. Loading is all-or-nothing: the first invalid record or
//! duplicate id aborts the whole load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::command::Command;
use super::definition::{EventDef, RawEventDef};
use crate::content;
use crate::error::LoadError;

/// Registry for all event definitions
pub struct EventRegistry {
    /// Events in registration order
    events: Vec<Arc<EventDef>>,
    /// id -> index into `events`
    by_id: HashMap<String, usize>,
    /// trigger type -> indices into `events`, ascending
    by_trigger: HashMap<String, Vec<usize>>,
    /// id -> file the event came from
    sources: HashMap<String, PathBuf>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            by_id: HashMap::new(),
            by_trigger: HashMap::new(),
            sources: HashMap::new(),
        }
    }

    /// Load every `*.json` file under `events_dir`, in path order
    pub fn load_from_directory(events_dir: &Path) -> Result<Self, LoadError> {
        info!("Loading events from {:?}", events_dir);

        let mut registry = Self::new();

        if !events_dir.exists() {
            warn!("Events directory does not exist: {:?}", events_dir);
            return Ok(registry);
        }

        let paths = content::json_files(events_dir)?;

        for path in &paths {
            registry.load_file(path)?;
        }

        info!("Loaded {} events from {} files", registry.len(), paths.len());

        registry.validate_event_calls();

        Ok(registry)
    }

    /// Load a single catalog file holding one event object or an array of them
    pub fn load_file(&mut self, path: &Path) -> Result<usize, LoadError> {
        let records = match content::read_json(path)? {
            Value::Array(items) => items,
            other => vec![other],
        };

        let count = records.len();
        for (index, record) in records.into_iter().enumerate() {
            let event = parse_record(path, index, record)?;
            self.register_from(event, path)?;
        }

        debug!("Loaded {} events from {:?}", count, path);
        Ok(count)
    }

    /// Add an event that did not come from a file
    pub fn register(&mut self, event: EventDef) -> Result<(), LoadError> {
        self.register_from(event, Path::new("<memory>"))
    }

    /// Add an event, indexing it under each of its trigger types
    pub fn register_from(&mut self, event: EventDef, source: &Path) -> Result<(), LoadError> {
        if let Some(first) = self.sources.get(&event.id) {
            return Err(LoadError::DuplicateIdentifier {
                id: event.id.clone(),
                first: first.clone(),
                second: source.to_path_buf(),
            });
        }

        let index = self.events.len();
        for trigger_type in event.trigger_types() {
            self.by_trigger
                .entry(trigger_type.to_string())
                .or_default()
                .push(index);
        }
        self.by_id.insert(event.id.clone(), index);
        self.sources.insert(event.id.clone(), source.to_path_buf());
        self.events.push(Arc::new(event));

        Ok(())
    }

    /// Get an event by ID
    pub fn lookup_by_id(&self, id: &str) -> Option<Arc<EventDef>> {
        self.by_id.get(id).map(|&i| Arc::clone(&self.events[i]))
    }

    /// Events listening for `trigger_type`, in registration order
    pub fn candidates(&self, trigger_type: &str) -> Vec<Arc<EventDef>> {
        self.by_trigger
            .get(trigger_type)
            .map(|indices| indices.iter().map(|&i| Arc::clone(&self.events[i])).collect())
            .unwrap_or_default()
    }

    /// File an event was loaded from
    pub fn source_of(&self, id: &str) -> Option<&Path> {
        self.sources.get(id).map(PathBuf::as_path)
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<EventDef>> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Warn about CALL_EVENT targets that are not in the catalog
    fn validate_event_calls(&self) {
        for event in self.all() {
            for step in &event.script {
                if let Command::CallEvent { event_id } = &step.command {
                    if !self.by_id.contains_key(event_id) {
                        warn!(
                            "Event '{}' calls non-existent event '{}'",
                            event.id, event_id
                        );
                    }
                }
            }
        }
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_record(path: &Path, index: usize, record: Value) -> Result<EventDef, LoadError> {
    let label = match record.get("id").and_then(Value::as_str) {
        Some(id) => format!("#{} ({})", index, id),
        None => format!("#{}", index),
    };

    let schema_error = |detail: String| LoadError::Schema {
        path: path.to_path_buf(),
        record: label.clone(),
        detail,
    };

    if !record.is_object() {
        return Err(schema_error("record must be a JSON object".to_string()));
    }

    let raw: RawEventDef =
        serde_json::from_value(record).map_err(|e| schema_error(e.to_string()))?;

    EventDef::from_raw(&raw).map_err(schema_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn event_json(id: &str, trigger: &str) -> String {
        format!(
            r#"{{"id": "{}", "category": "main", "triggers": [{{"type": "{}"}}],
                "set_flags": ["{}"], "script": []}}"#,
            id, trigger, id
        )
    }

    #[test]
    fn test_load_catalog_in_path_order() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "b/second.json", &event_json("story.b", "game_start"));
        write(temp_dir.path(), "a.json", &event_json("story.a", "game_start"));
        write(
            temp_dir.path(),
            "c.json",
            &format!("[{}, {}]", event_json("story.c1", "game_start"), event_json("story.c2", "talk")),
        );
        write(temp_dir.path(), "notes.txt", "not an event");

        let registry = EventRegistry::load_from_directory(temp_dir.path()).unwrap();
        assert_eq!(registry.len(), 4);

        let order: Vec<String> = registry
            .candidates("game_start")
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(order, vec!["story.a", "story.b", "story.c1"]);
        assert_eq!(registry.candidates("talk").len(), 1);
        assert!(registry.candidates("battle_end").is_empty());
    }

    #[test]
    fn test_duplicate_id_across_files_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "one.json", &event_json("story.start", "game_start"));
        write(temp_dir.path(), "two.json", &event_json("story.start", "enter_location"));

        let result = EventRegistry::load_from_directory(temp_dir.path());
        match result {
            Err(LoadError::DuplicateIdentifier { id, first, second }) => {
                assert_eq!(id, "story.start");
                assert!(first.ends_with("one.json"));
                assert!(second.ends_with("two.json"));
            }
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("duplicate id was accepted"),
        }
    }

    #[test]
    fn test_schema_error_names_record() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            "bad.json",
            &format!(
                r#"[{}, {{"id": "story.bad", "category": "main", "triggers": [{{"type": "x"}}], "script": [], "extra": 1}}]"#,
                event_json("story.ok", "game_start")
            ),
        );

        match EventRegistry::load_from_directory(temp_dir.path()) {
            Err(LoadError::Schema { path, record, .. }) => {
                assert!(path.ends_with("bad.json"));
                assert_eq!(record, "#1 (story.bad)");
            }
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("invalid record was accepted"),
        }
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "broken.json", "{ not json");
        assert!(matches!(
            EventRegistry::load_from_directory(temp_dir.path()),
            Err(LoadError::Json { .. })
        ));
    }

    #[test]
    fn test_malformed_command_argument_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            "gift.json",
            r#"{"id": "gift", "category": "optional", "triggers": [{"type": "talk"}],
                "script": [{"cmd": "GIVE_ITEM", "item": "potion", "qty": {"n": 2}}]}"#,
        );
        assert!(matches!(
            EventRegistry::load_from_directory(temp_dir.path()),
            Err(LoadError::Schema { .. })
        ));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let registry = EventRegistry::load_from_directory(&temp_dir.path().join("nope")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_and_multi_trigger_index() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            "multi.json",
            r#"{"id": "rival.meet", "category": "rival",
                "triggers": [{"type": "enter_location", "location": "A"}, {"type": "enter_location", "location": "B"}, {"type": "talk"}],
                "script": [{"cmd": "SET_FLAG", "flag": "rival.met"}]}"#,
        );
        let registry = EventRegistry::load_from_directory(temp_dir.path()).unwrap();

        // Two triggers of one type index the event once
        assert_eq!(registry.candidates("enter_location").len(), 1);
        assert_eq!(registry.candidates("talk").len(), 1);
        assert!(registry.lookup_by_id("rival.meet").is_some());
        assert!(registry.lookup_by_id("rival.gone").is_none());
        assert!(registry.source_of("rival.meet").unwrap().ends_with("multi.json"));
    }

    #[test]
    fn test_bundled_catalog_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/events");
        let registry = EventRegistry::load_from_directory(&dir).unwrap();

        assert!(registry.lookup_by_id("story.start").is_some());
        assert!(registry.lookup_by_id("story.rival_initial_visit").is_some());
        assert_eq!(registry.candidates("game_start").len(), 1);
    }
}
