use anyhow::Result;
use questr_core::engine::QuestEngine;
use questr_core::quest_types::normalize_quest_type;
use questr_core::storage::KeyValueStore;

use crate::cli::ListCommand;
use crate::views::table::display_tasks;

pub async fn list_tasks<S: KeyValueStore>(engine: &QuestEngine<S>, command: ListCommand) -> Result<()> {
    let mut tasks = if command.all {
        engine.tasks().await
    } else {
        engine.visible_tasks().await
    };

    if let Some(label) = command.quest_type.as_deref().and_then(normalize_quest_type) {
        tasks.retain(|t| t.quest_type.as_deref() == Some(label.as_str()));
    }

    display_tasks(&tasks, engine.today());
    Ok(())
}

pub async fn today<S: KeyValueStore>(engine: &QuestEngine<S>) -> Result<()> {
    let tasks = engine.today_tasks().await;
    display_tasks(&tasks, engine.today());
    Ok(())
}
