use anyhow::{anyhow, Result};
use owo_colors::OwoColorize;
use questr_core::engine::QuestEngine;
use questr_core::storage::KeyValueStore;

use crate::cli::IdCommand;
use crate::util::resolve_task;

pub async fn do_task<S: KeyValueStore>(engine: &QuestEngine<S>, command: IdCommand) -> Result<()> {
    let task = resolve_task(engine, &command.id).await?;

    if task.is_template() {
        return Err(anyhow!(
            "'{}' is a recurring quest; complete today's occurrence instead (see `questr today`)",
            task.title
        ));
    }
    if task.is_completed() {
        return Err(anyhow!("'{}' is already completed", task.title));
    }
    if task.is_failure() {
        return Err(anyhow!("'{}' is a missed-quest record and cannot be completed", task.title));
    }

    if !engine.complete_task(task.id).await {
        return Err(anyhow!("Could not complete '{}'", task.title));
    }

    let user = engine.user().await;
    println!(
        "{} Completed '{}' {} (level {}, streak {} day(s))",
        "✓".green(),
        task.title,
        format!("+{} XP", task.xp_reward).green().bold(),
        user.level,
        user.streak_days
    );
    Ok(())
}
