//! Narrative event engine.
//!
//! Decides which scripted story events fire for the player's current state,
//! runs their scripts, and resolves localized dialogue.

pub mod config;
mod content;
pub mod dialogue;
pub mod error;
pub mod event;
pub mod flags;
pub mod save;

pub use config::EngineConfig;
pub use dialogue::DialogueResolver;
pub use error::{CollaboratorError, EngineError, LoadError};
pub use event::{EventEngine, EventRegistry, GameContext, TriggerPayload};
pub use flags::FlagStore;
