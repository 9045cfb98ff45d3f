use anyhow::{anyhow, Result};
use questr_core::engine::QuestEngine;
use questr_core::error::CoreError;
use questr_core::models::Task;
use questr_core::storage::KeyValueStore;
use uuid::Uuid;

/// Number of id characters shown in tables.
pub const SHORT_ID_LEN: usize = 8;

pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..SHORT_ID_LEN].to_string()
}

pub async fn resolve_task_id<S: KeyValueStore>(engine: &QuestEngine<S>, short_id: &str) -> Result<Uuid> {
    Ok(resolve_task(engine, short_id).await?.id)
}

pub async fn resolve_task<S: KeyValueStore>(engine: &QuestEngine<S>, short_id: &str) -> Result<Task> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let mut tasks = engine.find_tasks_by_short_id_prefix(short_id).await;
    if tasks.len() == 1 {
        Ok(tasks.remove(0))
    } else if tasks.is_empty() {
        Err(anyhow!(CoreError::NotFound(format!(
            "No quest found with ID prefix '{}'",
            short_id
        ))))
    } else {
        let task_info: Vec<(String, String)> = tasks
            .into_iter()
            .map(|t| (t.id.to_string(), t.display_title()))
            .collect();
        Err(anyhow!(CoreError::AmbiguousId(task_info)))
    }
}
