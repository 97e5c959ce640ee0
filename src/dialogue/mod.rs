//! Dialogue Module
//!
//! Localized dialogue with several phrasings per line, speaker display names
//! and hot-reloadable content.

pub mod resolver;
pub mod variant;
pub mod watch;

pub use resolver::DialogueResolver;
pub use variant::{ALT_MODE, DialogueEntry, NO_TEXT};
pub use watch::{HotReloadEvent, start_content_watcher};
