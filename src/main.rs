use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use tracing::{error, info, warn};

use narrative_engine::dialogue::{HotReloadEvent, start_content_watcher};
use narrative_engine::event::{BattleManager, BattleOutcome, DialogueUi, MemoryInventory};
use narrative_engine::{
    CollaboratorError, DialogueResolver, EngineConfig, EventEngine, EventRegistry, GameContext,
    TriggerPayload, save,
};

// ============================================================================
// Terminal collaborators
// ============================================================================

/// Prints dialogue to stdout and reads choices from stdin
struct TerminalUi;

impl DialogueUi for TerminalUi {
    fn show_dialogue(&mut self, speaker: &str, text: &str) -> Result<(), CollaboratorError> {
        if speaker.is_empty() {
            println!("{}", text);
        } else {
            println!("{}: {}", speaker, text);
        }
        Ok(())
    }

    fn choose(&mut self, options: &[String]) -> Result<usize, CollaboratorError> {
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }

        let stdin = io::stdin();
        loop {
            print!("choose> ");
            io::stdout().flush().map_err(|e| CollaboratorError::Ui(e.to_string()))?;

            let mut line = String::new();
            let read = stdin
                .lock()
                .read_line(&mut line)
                .map_err(|e| CollaboratorError::Ui(e.to_string()))?;
            if read == 0 {
                return Err(CollaboratorError::Ui("input closed during choice".to_string()));
            }

            match line.trim().parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => println!("Enter a number from 1 to {}", options.len()),
            }
        }
    }
}

/// Battles are out of scope for the terminal driver; every battle is won
struct LoggedBattles;

impl BattleManager for LoggedBattles {
    fn start(&mut self, battle_id: &str, context: Option<&str>) -> Result<BattleOutcome, CollaboratorError> {
        match context {
            Some(context) => info!("Battle {} ({}) started", battle_id, context),
            None => info!("Battle {} started", battle_id),
        }
        Ok(BattleOutcome::Won)
    }
}

// ============================================================================
// Input
// ============================================================================

#[derive(Debug, PartialEq)]
enum Input {
    Trigger { trigger_type: String, payload: TriggerPayload },
    Save,
    Load,
    Mode(String),
    Flags,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "save" => Input::Save,
        "load" => Input::Load,
        "flags" => Input::Flags,
        "quit" | "exit" => Input::Quit,
        _ => {
            if let Some(mode) = line.strip_prefix("mode ") {
                return Input::Mode(mode.trim().to_string());
            }
            if let Some((trigger_type, target)) = line.split_once('@') {
                return Input::Trigger {
                    trigger_type: trigger_type.trim().to_string(),
                    payload: map_payload(target),
                };
            }
            match line.split_once(':') {
                Some((trigger_type, location)) => Input::Trigger {
                    trigger_type: trigger_type.trim().to_string(),
                    payload: TriggerPayload::at_location(location.trim()),
                },
                None => Input::Trigger {
                    trigger_type: line.to_string(),
                    payload: TriggerPayload::default(),
                },
            }
        }
    }
}

/// `map` or `map,x,y`; a tile that does not parse is left out
fn map_payload(target: &str) -> TriggerPayload {
    let mut parts = target.split(',').map(str::trim);
    let map = parts.next().unwrap_or_default();
    let tile = match (parts.next(), parts.next()) {
        (Some(x), Some(y)) => x.parse().ok().zip(y.parse().ok()),
        _ => None,
    };
    TriggerPayload::default().with_map(map, tile)
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let config = match EngineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured filter
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = match EventRegistry::load_from_directory(&config.content.events_dir) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to load events: {}", e);
            std::process::exit(1);
        }
    };

    let mut dialogue = match DialogueResolver::load_from_directory(
        &config.content.dialogue_dir,
        &config.dialogue.mode,
        config.dialogue_rng(),
    ) {
        Ok(dialogue) => dialogue,
        Err(e) => {
            error!("Failed to load dialogue: {}", e);
            std::process::exit(1);
        }
    };
    dialogue.set_placeholder("PLAYER", &config.dialogue.player_name);
    dialogue.set_placeholder("RIVAL", &config.dialogue.rival_name);

    let mut engine = EventEngine::new(registry).with_max_call_depth(config.engine.max_call_depth);
    let mut ctx = GameContext::new(
        dialogue,
        Box::new(MemoryInventory::new()),
        Box::new(TerminalUi),
        Box::new(LoggedBattles),
    );

    let reload_rx = config
        .content
        .hot_reload
        .then(|| start_content_watcher(vec![config.content.dialogue_dir.clone()]));

    info!(
        "Ready: {} events, {} dialogue lines, mode '{}'",
        engine.registry().len(),
        ctx.dialogue.len(),
        ctx.dialogue.mode()
    );
    println!("Enter <trigger>[:<location>], <trigger>@<map>[,x,y], save, load, mode <name>, flags or quit");

    let stdin = io::stdin();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        }

        if let Some(rx) = &reload_rx {
            drain_reloads(rx, &mut ctx.dialogue);
        }

        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Trigger { trigger_type, payload } => {
                match engine.handle_trigger(&mut ctx, &trigger_type, &payload) {
                    Ok(fired) if fired.is_empty() => println!("(nothing happens)"),
                    Ok(fired) => info!("Fired: {}", fired.join(", ")),
                    Err(e) => warn!("Trigger {} failed: {}", trigger_type, e),
                }
            }
            Input::Save => {
                let snapshot = engine.snapshot(&ctx.flags);
                if let Err(e) = save::write(&config.save.path, &snapshot) {
                    error!("Save failed: {}", e);
                }
            }
            Input::Load => match save::read(&config.save.path) {
                Some(snapshot) => engine.restore(&mut ctx, snapshot),
                None => println!("No save at {}", config.save.path.display()),
            },
            Input::Mode(mode) => {
                ctx.dialogue.set_mode(&mode);
                println!("Dialogue mode: {}", ctx.dialogue.mode());
            }
            Input::Flags => {
                for flag in ctx.flags.raised() {
                    match ctx.flags.value(flag) {
                        Some(value) => println!("  {} = {}", flag, value),
                        None => println!("  {}", flag),
                    }
                }
            }
        }
    }

    info!("Goodbye");
}

/// Apply pending content changes before the next dispatch
fn drain_reloads(rx: &Receiver<HotReloadEvent>, dialogue: &mut DialogueResolver) {
    let mut changed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            HotReloadEvent::Changed(path) => {
                info!("Dialogue changed: {:?}", path);
                changed = true;
            }
            HotReloadEvent::Error(e) => warn!("Hot-reload watcher error: {}", e),
        }
    }

    if changed {
        match dialogue.reload() {
            Ok(count) => info!("Reloaded {} dialogue lines", count),
            Err(e) => warn!("Dialogue reload failed, keeping previous content: {}", e),
        }
    }
}
