//! Script Commands
//!
//! Known commands are parsed into a closed set of variants when the catalog
//! loads, so a malformed argument fails the load instead of a play session.
//! Commands this build does not know are kept as `Unknown` and skipped at
//! execution time.

use super::definition::{ArgValue, ScriptCommand};

/// Speaker used by SHOW_TEXT when none is given
pub const DEFAULT_SPEAKER: &str = "narration";
/// Flag prefix used by STARTER_CHOICE when none is given
pub const DEFAULT_STARTER_PREFIX: &str = "starter.";
/// Flag that records the chosen starter
pub const STARTER_FLAG: &str = "player.starter";

/// A parsed script command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Show a line of dialogue
    ShowText { speaker: String, text_id: String },
    /// Grant items to the player
    GiveItem { item: String, qty: i64 },
    /// Raise a flag mid-script
    SetFlag { flag: String },
    /// Lower a flag mid-script
    ClearFlag { flag: String },
    /// Hand off to the battle system; the outcome is not inspected
    StartBattle { battle_id: String, context: Option<String> },
    /// Ask the player to pick a starter
    StarterChoice { choices: Vec<String>, flag_prefix: String },
    /// Chain into another event by id
    CallEvent { event_id: String },
    /// Not implemented by this build
    Unknown { cmd: String },
}

impl Command {
    pub fn parse(raw: &ScriptCommand) -> Result<Self, String> {
        let name = raw.cmd.as_str();
        let command = match name {
            "SHOW_TEXT" => Command::ShowText {
                speaker: optional_str(raw, "speaker")?
                    .unwrap_or_else(|| DEFAULT_SPEAKER.to_string()),
                text_id: match optional_str(raw, "text_id")? {
                    Some(id) => id,
                    None => required_str(raw, "dialogue_key")?,
                },
            },
            "GIVE_ITEM" => {
                let qty = optional_int(raw, "qty")?.unwrap_or(1);
                if qty == 0 {
                    return Err("GIVE_ITEM 'qty' must not be zero".to_string());
                }
                Command::GiveItem {
                    item: required_str(raw, "item")?,
                    qty,
                }
            }
            "SET_FLAG" => Command::SetFlag {
                flag: required_str(raw, "flag")?,
            },
            "CLEAR_FLAG" => Command::ClearFlag {
                flag: required_str(raw, "flag")?,
            },
            "START_BATTLE" => Command::StartBattle {
                battle_id: required_str(raw, "battle_id")?,
                context: optional_str(raw, "context")?,
            },
            "STARTER_CHOICE" => {
                let choices = required_list(raw, "choices")?;
                if choices.is_empty() {
                    return Err("STARTER_CHOICE needs at least one choice".to_string());
                }
                Command::StarterChoice {
                    choices,
                    flag_prefix: optional_str(raw, "assign_flag_prefix")?
                        .unwrap_or_else(|| DEFAULT_STARTER_PREFIX.to_string()),
                }
            }
            "CALL_EVENT" => Command::CallEvent {
                event_id: required_str(raw, "event_id")?,
            },
            _ => Command::Unknown {
                cmd: name.to_string(),
            },
        };
        Ok(command)
    }

    /// Command name for logging
    pub fn name(&self) -> &str {
        match self {
            Command::ShowText { .. } => "SHOW_TEXT",
            Command::GiveItem { .. } => "GIVE_ITEM",
            Command::SetFlag { .. } => "SET_FLAG",
            Command::ClearFlag { .. } => "CLEAR_FLAG",
            Command::StartBattle { .. } => "START_BATTLE",
            Command::StarterChoice { .. } => "STARTER_CHOICE",
            Command::CallEvent { .. } => "CALL_EVENT",
            Command::Unknown { cmd } => cmd,
        }
    }
}

fn optional_str(raw: &ScriptCommand, key: &str) -> Result<Option<String>, String> {
    match raw.arg(key) {
        None => Ok(None),
        Some(ArgValue::Str(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("{} '{}' must be a string, got {:?}", raw.cmd, key, other)),
    }
}

fn required_str(raw: &ScriptCommand, key: &str) -> Result<String, String> {
    optional_str(raw, key)?.ok_or_else(|| format!("{} is missing '{}'", raw.cmd, key))
}

fn optional_int(raw: &ScriptCommand, key: &str) -> Result<Option<i64>, String> {
    match raw.arg(key) {
        None => Ok(None),
        Some(v) => v
            .as_int()
            .map(Some)
            .ok_or_else(|| format!("{} '{}' must be an integer, got {:?}", raw.cmd, key, v)),
    }
}

fn required_list(raw: &ScriptCommand, key: &str) -> Result<Vec<String>, String> {
    match raw.arg(key) {
        None => Err(format!("{} is missing '{}'", raw.cmd, key)),
        Some(v) => v
            .as_list()
            .map(<[String]>::to_vec)
            .ok_or_else(|| format!("{} '{}' must be a list of strings, got {:?}", raw.cmd, key, v)),
    }
}
