//! Event Definition Structures
//!
//! Raw records are deserialized from the JSON event catalog; the resolved
//! `EventDef` is built from them once validation passes and never changes
//! afterwards.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::command::Command;

// ============================================================================
// Raw JSON Structures
// ============================================================================

fn default_once() -> bool {
    true
}

/// Raw event record as it appears in a catalog file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEventDef {
    pub id: String,
    pub category: Category,
    #[serde(default)]
    pub phase: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub triggers: Vec<RawTrigger>,
    #[serde(default = "default_once")]
    pub once: bool,
    #[serde(default)]
    pub set_flags: Vec<String>,
    #[serde(default)]
    pub clear_flags: Vec<String>,
    /// Interpreted by collaborators, never by the engine
    #[serde(default)]
    pub reward: Value,
    pub script: Vec<RawScriptCommand>,
    /// Advisory, UI-only
    #[serde(default)]
    pub next_hints: Vec<Value>,
}

/// Raw trigger object; everything besides `type` is kept for promotion
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrigger {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Raw script command; arguments sit next to `cmd`
#[derive(Debug, Clone, Deserialize)]
pub struct RawScriptCommand {
    pub cmd: String,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

// ============================================================================
// Resolved Structures
// ============================================================================

/// Story category an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Main,
    Gym,
    Galactic,
    Rival,
    System,
    Optional,
    Legend,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Main => "main",
            Category::Gym => "gym",
            Category::Galactic => "galactic",
            Category::Rival => "rival",
            Category::System => "system",
            Category::Optional => "optional",
            Category::Legend => "legend",
        }
    }
}

/// Single prerequisite term; an event needs all of its terms to hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// `flag`: must be true
    Set(String),
    /// `!flag`: must be false
    Unset(String),
}

impl Prerequisite {
    pub fn parse(expr: &str) -> Result<Self, String> {
        let (negated, name) = match expr.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, expr),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("empty prerequisite '{}'", expr));
        }
        Ok(if negated {
            Prerequisite::Unset(name.to_string())
        } else {
            Prerequisite::Set(name.to_string())
        })
    }

    /// Check this term against a flag lookup
    pub fn holds(&self, flag_value: impl Fn(&str) -> bool) -> bool {
        match self {
            Prerequisite::Set(f) => flag_value(f),
            Prerequisite::Unset(f) => !flag_value(f),
        }
    }
}

/// Details of an incoming trigger, matched against event triggers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerPayload {
    pub location: Option<String>,
    pub npc_id: Option<String>,
    pub group_id: Option<String>,
    pub map: Option<String>,
    pub tile: Option<(i32, i32)>,
    pub name: Option<String>,
}

impl TriggerPayload {
    pub fn at_location(location: &str) -> Self {
        Self {
            location: Some(location.to_string()),
            ..Self::default()
        }
    }

    pub fn with_npc(mut self, npc_id: &str) -> Self {
        self.npc_id = Some(npc_id.to_string());
        self
    }

    pub fn with_map(mut self, map: &str, tile: Option<(i32, i32)>) -> Self {
        self.map = Some(map.to_string());
        self.tile = tile;
        self
    }
}

/// A trigger an event listens for
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub trigger_type: String,
    pub location: Option<String>,
    pub npc_id: Option<String>,
    pub group_id: Option<String>,
    pub map: Option<String>,
    pub tile: Option<(i32, i32)>,
    pub name: Option<String>,
    /// Every author-supplied field except `type`
    pub raw: Map<String, Value>,
}

impl Trigger {
    pub fn from_raw(raw: &RawTrigger) -> Result<Self, String> {
        if raw.trigger_type.trim().is_empty() {
            return Err("trigger type is empty".to_string());
        }

        Ok(Self {
            trigger_type: raw.trigger_type.clone(),
            location: string_field(&raw.fields, "location")?,
            npc_id: string_field(&raw.fields, "npc_id")?,
            group_id: string_field(&raw.fields, "group_id")?,
            map: string_field(&raw.fields, "map")?,
            tile: tile_field(&raw.fields)?,
            name: string_field(&raw.fields, "name")?,
            raw: raw.fields.clone(),
        })
    }

    /// Type must match; a field only constrains when both sides declare it
    pub fn accepts(&self, trigger_type: &str, payload: &TriggerPayload) -> bool {
        fn agree<T: PartialEq>(ours: &Option<T>, theirs: &Option<T>) -> bool {
            match (ours, theirs) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }

        self.trigger_type == trigger_type
            && agree(&self.location, &payload.location)
            && agree(&self.npc_id, &payload.npc_id)
            && agree(&self.group_id, &payload.group_id)
            && agree(&self.map, &payload.map)
            && agree(&self.tile, &payload.tile)
            && agree(&self.name, &payload.name)
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("trigger field '{}' must be a string, got {}", key, other)),
    }
}

fn tile_field(fields: &Map<String, Value>) -> Result<Option<(i32, i32)>, String> {
    let value = match fields.get("tile") {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };

    let coords: Option<Vec<i32>> = value.as_array().and_then(|items| {
        items
            .iter()
            .map(|v| v.as_i64().and_then(|n| i32::try_from(n).ok()))
            .collect()
    });

    match coords.as_deref() {
        Some([x, y]) => Ok(Some((*x, *y))),
        _ => Err(format!("trigger field 'tile' must be a pair of integers, got {}", value)),
    }
}

/// A script argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl ArgValue {
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(ArgValue::Str(s.clone())),
            Value::Bool(b) => Ok(ArgValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(ArgValue::Int)
                .or_else(|| n.as_f64().map(ArgValue::Float))
                .ok_or_else(|| format!("unsupported number {}", n)),
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| format!("list items must be strings, got {}", v))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ArgValue::List),
            Value::Null | Value::Object(_) => Err(format!("unsupported argument value {}", value)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ArgValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// A script command as authored: its name and argument map
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCommand {
    pub cmd: String,
    pub args: BTreeMap<String, ArgValue>,
}

impl ScriptCommand {
    pub fn from_raw(raw: &RawScriptCommand) -> Result<Self, String> {
        if raw.cmd.trim().is_empty() {
            return Err("command name is empty".to_string());
        }

        let args = raw
            .args
            .iter()
            .map(|(k, v)| {
                ArgValue::from_json(v)
                    .map(|arg| (k.clone(), arg))
                    .map_err(|e| format!("{} argument '{}': {}", raw.cmd, k, e))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self {
            cmd: raw.cmd.clone(),
            args,
        })
    }

    pub fn arg(&self, key: &str) -> Option<&ArgValue> {
        self.args.get(key)
    }
}

/// One step of an event script: the parsed command and what the author wrote
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub command: Command,
    pub raw: ScriptCommand,
}

/// A fully resolved event definition
#[derive(Debug, Clone)]
pub struct EventDef {
    pub id: String,
    pub category: Category,
    /// Authoring order only; the engine ignores it
    pub phase: u32,
    pub prerequisites: Vec<Prerequisite>,
    pub triggers: Vec<Trigger>,
    pub once: bool,
    pub set_flags: Vec<String>,
    pub clear_flags: Vec<String>,
    pub reward: Value,
    pub script: Vec<ScriptStep>,
    pub next_hints: Vec<Value>,
}

/// Event ids are lowercase ascii, digits and `_ . -`
pub fn is_valid_event_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
}

impl EventDef {
    /// Create an EventDef from a raw catalog record
    pub fn from_raw(raw: &RawEventDef) -> Result<Self, String> {
        if !is_valid_event_id(&raw.id) {
            return Err(format!("id '{}' must match ^[a-z0-9_.-]+$", raw.id));
        }

        if raw.triggers.is_empty() {
            return Err("triggers must not be empty".to_string());
        }

        let triggers = raw
            .triggers
            .iter()
            .enumerate()
            .map(|(i, t)| Trigger::from_raw(t).map_err(|e| format!("trigger {}: {}", i, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let prerequisites = raw
            .prerequisites
            .iter()
            .map(|p| Prerequisite::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        let script = raw
            .script
            .iter()
            .enumerate()
            .map(|(i, c)| -> Result<ScriptStep, String> {
                let raw_cmd = ScriptCommand::from_raw(c)
                    .map_err(|e| format!("script[{}]: {}", i, e))?;
                let command = Command::parse(&raw_cmd)
                    .map_err(|e| format!("script[{}]: {}", i, e))?;
                Ok(ScriptStep {
                    command,
                    raw: raw_cmd,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if script.is_empty() && raw.set_flags.is_empty() && raw.clear_flags.is_empty() {
            return Err("script is empty and the event changes no flags".to_string());
        }

        Ok(Self {
            id: raw.id.clone(),
            category: raw.category,
            phase: raw.phase,
            prerequisites,
            triggers,
            once: raw.once,
            set_flags: raw.set_flags.clone(),
            clear_flags: raw.clear_flags.clone(),
            reward: raw.reward.clone(),
            script,
            next_hints: raw.next_hints.clone(),
        })
    }

    /// Distinct trigger types in declaration order
    pub fn trigger_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::with_capacity(self.triggers.len());
        for t in &self.triggers {
            if !types.contains(&t.trigger_type.as_str()) {
                types.push(&t.trigger_type);
            }
        }
        types
    }

    /// Whether any trigger of this event accepts the incoming trigger
    pub fn listens_for(&self, trigger_type: &str, payload: &TriggerPayload) -> bool {
        self.triggers.iter().any(|t| t.accepts(trigger_type, payload))
    }
}
