use anyhow::{anyhow, Result};
use questr_core::engine::QuestEngine;
use questr_core::quest_types::normalize_quest_type;
use questr_core::storage::KeyValueStore;

use crate::cli::{TypesAction, TypesCommand};
use crate::views::table::display_types;

pub async fn types_command<S: KeyValueStore>(engine: &QuestEngine<S>, command: TypesCommand) -> Result<()> {
    match command.action {
        TypesAction::List => {
            let registry = engine.quest_types().await;
            display_types(registry.labels());
        }
        TypesAction::Add { label } => {
            let Some(normalized) = normalize_quest_type(&label) else {
                return Err(anyhow!("Quest type cannot be blank"));
            };
            if !engine.add_quest_type(&label).await {
                return Err(anyhow!("Quest type '{}' already exists", normalized));
            }
            println!("Added quest type '{}'", normalized);
        }
    }
    Ok(())
}
