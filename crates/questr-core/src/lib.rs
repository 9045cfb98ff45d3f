//! # Questr Core Library
//!
//! The engine behind a gamified task tracker: quests earn XP, XP climbs a
//! progressive level curve, consecutive active days build a streak, and
//! recurring quests are generated per local calendar day with a penalty for
//! every missed occurrence.
//!
//! ## Features
//!
//! - **Full Recompute**: level, XP and failure totals are always derived from
//!   the whole task collection, so undo and delete can never drift them
//! - **Recurring Quests**: weekday templates, idempotent daily generation and
//!   missed-occurrence detection with a grace window for late completions
//! - **Streaks & Milestones**: consecutive-day tracking with bonus XP at
//!   configurable streak lengths
//! - **Timezone Awareness**: every day boundary is a local calendar date in
//!   an IANA timezone
//! - **Forgiving Persistence**: corrupt records fall back to defaults and
//!   rejected writes are retried with a smaller payload
//!
//! ## Core Modules
//!
//! - [`engine`]: The command surface and read model
//! - [`tasks`]: Task collection and its mutations
//! - [`recurrence`]: Instance generation and failure detection
//! - [`streak`]: Streak rollover and milestone bonuses
//! - [`level`]: XP to level mapping
//! - [`storage`]: Key-value persistence over SQLite or memory
//! - [`models`]: Core data structures and wire format
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use questr_core::{
//!     config::EngineConfig, engine::QuestEngine, models::NewTaskData, storage::SqliteStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::open("questr.db").await?;
//!     let engine = QuestEngine::new(store, EngineConfig::with_timezone("Europe/Berlin"))?;
//!
//!     engine.sync().await;
//!
//!     let quest = engine
//!         .add_task(NewTaskData { title: "Stretch".to_string(), ..Default::default() })
//!         .await?;
//!     engine.complete_task(quest.id).await;
//!
//!     let user = engine.user().await;
//!     println!("Level {} ({} XP to go)", user.level, user.xp_to_next_level);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod level;
pub mod models;
pub mod quest_types;
pub mod recurrence;
pub mod storage;
pub mod streak;
pub mod tasks;
pub mod timezone;
