use anyhow::{anyhow, Result};
use owo_colors::OwoColorize;
use questr_core::engine::QuestEngine;
use questr_core::storage::KeyValueStore;

use crate::cli::IdCommand;
use crate::util::{resolve_task_id, short_id};

pub async fn copy_task<S: KeyValueStore>(engine: &QuestEngine<S>, command: IdCommand) -> Result<()> {
    let id = resolve_task_id(engine, &command.id).await?;
    let copy = engine
        .copy_task(id)
        .await
        .ok_or_else(|| anyhow!("This quest cannot be copied"))?;

    println!(
        "{} Copied to '{}' [{}]",
        "✓".green(),
        copy.title,
        short_id(&copy.id).yellow()
    );
    Ok(())
}
