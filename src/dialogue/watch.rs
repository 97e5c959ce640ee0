//! Dialogue hot-reload
//!
//! Watches content directories and reports changed JSON files over a channel.
//! The watcher never touches the resolver itself; the game loop drains the
//! channel between dispatches and calls `DialogueResolver::reload`.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, info};

/// Events from the hot-reload watcher
#[derive(Debug, Clone)]
pub enum HotReloadEvent {
    /// A content file was created or modified
    Changed(PathBuf),
    /// The watcher failed
    Error(String),
}

/// Start watching `dirs` on a background thread.
///
/// The thread exits once the returned receiver is dropped.
pub fn start_content_watcher(dirs: Vec<PathBuf>) -> Receiver<HotReloadEvent> {
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let (notify_tx, notify_rx) = mpsc::channel();

        let mut watcher = match RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                let _ = notify_tx.send(res);
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        ) {
            Ok(w) => w,
            Err(e) => {
                error!("Failed to create file watcher: {}", e);
                let _ = tx.send(HotReloadEvent::Error(e.to_string()));
                return;
            }
        };

        for dir in dirs.iter().filter(|d| d.exists()) {
            if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
                error!("Failed to watch {:?}: {}", dir, e);
            }
        }

        info!("Content hot-reload watcher started for {:?}", dirs);

        while let Ok(res) = notify_rx.recv() {
            let Some(message) = reload_event(res) else {
                continue;
            };

            if tx.send(message).is_err() {
                // Receiver dropped
                break;
            }
        }
    });

    rx
}

/// Map a raw watcher result to a reload message; `None` for irrelevant events
fn reload_event(res: Result<notify::Event, notify::Error>) -> Option<HotReloadEvent> {
    match res {
        Ok(event) => {
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return None;
            }
            event
                .paths
                .into_iter()
                .find(|p| p.extension().is_some_and(|ext| ext == "json"))
                .map(HotReloadEvent::Changed)
        }
        Err(e) => Some(HotReloadEvent::Error(e.to_string())),
    }
}
