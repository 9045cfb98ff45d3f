use anyhow::Result;
use questr_core::engine::QuestEngine;
use questr_core::storage::KeyValueStore;

use crate::views::table::display_status;

pub async fn status<S: KeyValueStore>(engine: &QuestEngine<S>) -> Result<()> {
    let user = engine.user().await;
    let level_up = engine.level_up().await;
    display_status(&user, engine.curve(), level_up);
    Ok(())
}

pub async fn dismiss<S: KeyValueStore>(engine: &QuestEngine<S>) -> Result<()> {
    if engine.level_up().await.is_none() {
        println!("No level-up to dismiss.");
        return Ok(());
    }
    engine.dismiss_level_up().await;
    println!("Level-up dismissed.");
    Ok(())
}
