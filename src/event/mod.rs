//! Event Module
//!
//! Declarative story events loaded from JSON, gated by flag prerequisites and
//! dispatched on external triggers. Scripts run synchronously against an
//! explicit game context.

pub mod command;
pub mod context;
pub mod definition;
pub mod engine;
pub mod registry;
pub mod script;

pub use command::Command;
pub use context::{BattleManager, BattleOutcome, DialogueUi, GameContext, Inventory, MemoryInventory};
pub use definition::{Category, EventDef, Prerequisite, ScriptCommand, Trigger, TriggerPayload};
pub use engine::{DEFAULT_MAX_CALL_DEPTH, EventEngine};
pub use registry::EventRegistry;
pub use script::execute_script;
