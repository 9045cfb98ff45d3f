use anyhow::{anyhow, Result};
use owo_colors::OwoColorize;
use questr_core::engine::QuestEngine;
use questr_core::storage::KeyValueStore;

use crate::cli::IdCommand;
use crate::util::resolve_task;

pub async fn undo_task<S: KeyValueStore>(engine: &QuestEngine<S>, command: IdCommand) -> Result<()> {
    let task = resolve_task(engine, &command.id).await?;

    if !task.is_completed() && !task.is_failure() {
        return Err(anyhow!("'{}' has nothing to undo", task.title));
    }
    if !engine.undo_task(task.id).await {
        return Err(anyhow!("Could not undo '{}'", task.title));
    }

    if task.is_failure() {
        println!(
            "{} Removed missed-quest record '{}' ({} XP restored)",
            "↺".cyan(),
            task.display_title(),
            task.penalty()
        );
    } else {
        println!(
            "{} Reopened '{}' ({} XP)",
            "↺".cyan(),
            task.title,
            format!("-{}", task.xp_reward).red()
        );
    }
    Ok(())
}
