use anyhow::{anyhow, Result};
use owo_colors::OwoColorize;
use questr_core::engine::QuestEngine;
use questr_core::models::UpdateTaskData;
use questr_core::storage::KeyValueStore;

use crate::cli::EditCommand;
use crate::util::resolve_task;

pub async fn edit_task<S: KeyValueStore>(engine: &QuestEngine<S>, command: EditCommand) -> Result<()> {
    let task = resolve_task(engine, &command.id).await?;

    if task.is_failure() {
        return Err(anyhow!("Missed-quest records cannot be edited"));
    }

    let description = if command.description_clear {
        Some(String::new())
    } else {
        command.description
    };

    let quest_type = if command.quest_type_clear {
        Some(None)
    } else {
        command.quest_type.map(Some)
    };

    let (is_recurring, recurring_days) = match (command.on, command.once) {
        (Some(days), _) => (Some(true), Some(days)),
        (None, true) => (Some(false), None),
        (None, false) => (None, None),
    };

    let data = UpdateTaskData {
        title: command.title,
        description,
        difficulty: command.difficulty.map(Into::into),
        is_recurring,
        recurring_days,
        quest_type,
    };

    match engine.edit_task(task.id, data).await? {
        Some(updated) => {
            println!("{} Updated quest '{}'", "✓".green(), updated.title);
            if updated.xp_reward != task.xp_reward {
                println!("  XP reward: {} → {}", task.xp_reward, updated.xp_reward);
            }
            Ok(())
        }
        None => Err(anyhow!("Could not edit '{}'", task.title)),
    }
}
