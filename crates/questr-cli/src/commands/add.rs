use anyhow::Result;
use chrono::Weekday;
use owo_colors::OwoColorize;
use questr_core::engine::QuestEngine;
use questr_core::models::NewTaskData;
use questr_core::storage::KeyValueStore;

use crate::cli::AddCommand;
use crate::util::short_id;

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub async fn add_task<S: KeyValueStore>(engine: &QuestEngine<S>, command: AddCommand) -> Result<()> {
    let recurring_days = if command.daily {
        ALL_WEEKDAYS.to_vec()
    } else {
        command.on
    };

    let data = NewTaskData {
        title: command.title,
        description: command.description.unwrap_or_default(),
        difficulty: command.difficulty.into(),
        is_recurring: !recurring_days.is_empty(),
        recurring_days,
        quest_type: command.quest_type,
    };

    let task = engine.add_task(data).await?;

    if task.is_template() {
        println!(
            "{} Added recurring quest '{}' ({}, {} XP) [{}]",
            "✓".green(),
            task.title,
            task.difficulty,
            task.xp_reward,
            short_id(&task.id).yellow()
        );
    } else {
        println!(
            "{} Added quest '{}' ({}, {} XP) [{}]",
            "✓".green(),
            task.title,
            task.difficulty,
            task.xp_reward,
            short_id(&task.id).yellow()
        );
    }

    Ok(())
}
