use anyhow::{anyhow, Result};
use dialoguer::Confirm;
use questr_core::engine::QuestEngine;
use questr_core::storage::KeyValueStore;

use crate::cli::DeleteCommand;
use crate::util::resolve_task;

pub async fn delete_task<S: KeyValueStore>(engine: &QuestEngine<S>, command: DeleteCommand) -> Result<()> {
    let task = resolve_task(engine, &command.id).await?;

    if !command.force {
        let prompt = if task.is_template() {
            format!(
                "Delete recurring quest '{}'? Its past occurrences are kept.",
                task.title
            )
        } else {
            format!("Are you sure you want to delete quest '{}'?", task.display_title())
        };
        let confirmation = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    if !engine.delete_task(task.id).await {
        return Err(anyhow!("Could not delete '{}'", task.title));
    }
    println!("Deleted quest '{}'", task.display_title());
    Ok(())
}
