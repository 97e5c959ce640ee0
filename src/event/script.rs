//! Script Executor
//!
//! Runs an event's commands in order against the game context. Unknown
//! commands are skipped with a warning; any collaborator error stops the
//! script and propagates.

use tracing::{debug, warn};

use super::command::{Command, STARTER_FLAG};
use super::context::GameContext;
use super::definition::ScriptStep;
use super::engine::EventEngine;
use crate::error::{CollaboratorError, EngineError};

/// Execute every step of a script, stopping at the first error
pub fn execute_script(
    engine: &mut EventEngine,
    ctx: &mut GameContext,
    script: &[ScriptStep],
) -> Result<(), EngineError> {
    for step in script {
        execute_command(engine, ctx, &step.command)?;
    }
    Ok(())
}

fn execute_command(
    engine: &mut EventEngine,
    ctx: &mut GameContext,
    command: &Command,
) -> Result<(), EngineError> {
    debug!("Executing {}", command.name());

    match command {
        Command::ShowText { speaker, text_id } => {
            let speaker = ctx.dialogue.speaker_name(speaker);
            let line = ctx.dialogue.resolve(text_id);
            ctx.ui.show_dialogue(&speaker, &line)?;
        }

        Command::GiveItem { item, qty } => {
            ctx.inventory.add(item, *qty)?;
            ctx.log(&format!("Received {} x{}", item, qty));
        }

        Command::SetFlag { flag } => ctx.flags.set(flag, true),

        Command::ClearFlag { flag } => ctx.flags.set(flag, false),

        Command::StartBattle { battle_id, context } => {
            // Outcome only matters to the battle system
            let outcome = ctx.battle_manager.start(battle_id, context.as_deref())?;
            debug!("Battle {} ended: {:?}", battle_id, outcome);
        }

        Command::StarterChoice { choices, flag_prefix } => {
            let index = ctx.ui.choose(choices)?;
            let chosen = choices.get(index).ok_or_else(|| {
                CollaboratorError::Ui(format!(
                    "choice {} out of range for {} options",
                    index,
                    choices.len()
                ))
            })?;
            ctx.flags.set(&format!("{}{}", flag_prefix, chosen), true);
            ctx.flags.set_value(STARTER_FLAG, chosen);
            ctx.log(&format!("Starter chosen: {}", chosen));
        }

        Command::CallEvent { event_id } => {
            engine.invoke(ctx, event_id)?;
        }

        Command::Unknown { cmd } => {
            warn!("Unknown command {}, skipping", cmd);
        }
    }

    Ok(())
}
