use anyhow::{anyhow, Result};
use dialoguer::Confirm;
use owo_colors::OwoColorize;
use questr_core::engine::QuestEngine;
use questr_core::storage::KeyValueStore;

use crate::cli::ResetCommand;

pub async fn reset<S: KeyValueStore>(engine: &QuestEngine<S>, command: ResetCommand) -> Result<()> {
    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt("Erase all quests, XP, streaks and history?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Reset cancelled.");
            return Ok(());
        }
    }

    if !engine.reset().await {
        return Err(anyhow!("Reset failed; see the log for details"));
    }
    println!("{}", "All data erased.".yellow());
    Ok(())
}
