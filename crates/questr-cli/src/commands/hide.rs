use anyhow::{anyhow, Result};
use questr_core::engine::QuestEngine;
use questr_core::storage::KeyValueStore;

use crate::cli::IdCommand;
use crate::util::resolve_task;

pub async fn set_hidden<S: KeyValueStore>(engine: &QuestEngine<S>, command: IdCommand, hidden: bool) -> Result<()> {
    let task = resolve_task(engine, &command.id).await?;

    let changed = if hidden {
        engine.hide_task(task.id).await
    } else {
        engine.unhide_task(task.id).await
    };

    match (changed, hidden) {
        (true, true) => println!("Hid quest '{}'", task.title),
        (true, false) => println!("Quest '{}' is visible again", task.title),
        (false, true) => return Err(anyhow!("'{}' cannot be hidden", task.title)),
        (false, false) => return Err(anyhow!("'{}' is not hidden", task.title)),
    }
    Ok(())
}
