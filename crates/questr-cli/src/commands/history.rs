use anyhow::Result;
use chrono_tz::Tz;
use questr_core::engine::QuestEngine;
use questr_core::storage::KeyValueStore;

use crate::cli::HistoryCommand;
use crate::views::table::display_history;

pub async fn history<S: KeyValueStore>(engine: &QuestEngine<S>, command: HistoryCommand, timezone: &Tz) -> Result<()> {
    let history = engine.task_history().await;
    let stats = engine.daily_stats().await;
    display_history(&history, &stats, command.days, timezone);
    Ok(())
}
