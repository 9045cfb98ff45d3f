//! Key-value persistence.
//!
//! The engine keeps eight JSON records under fixed keys. Reading never fails:
//! a missing, unreadable or unparseable value falls back to its default.
//! Writing never fails either; a rejected write is retried once with a
//! smaller payload and otherwise only logged.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::DifficultyTable;
use crate::db::{self, DbPool};
use crate::error::CoreError;
use crate::models::{
    DailyStats, LevelUp, StoredFailure, StoredTask, Task, TaskHistoryEntry, User, FAILED_PREFIX,
};
use crate::quest_types::QuestTypeRegistry;
use crate::tasks::verify_completed_tasks;
use crate::timezone::{local_date, previous_day};

pub mod keys {
    pub const TASKS: &str = "tasks";
    pub const USER: &str = "user";
    pub const DAILY_STATS: &str = "dailyStats";
    pub const TASK_HISTORY: &str = "taskHistory";
    pub const QUEST_TYPES: &str = "questTypes";
    pub const LAST_FAILURE_CHECK: &str = "lastFailureCheck";
    pub const LEVEL_UP: &str = "levelUp";
    pub const QUARANTINED_TASKS: &str = "quarantinedTasks";

    pub const ALL: [&str; 8] = [
        TASKS,
        USER,
        DAILY_STATS,
        TASK_HISTORY,
        QUEST_TYPES,
        LAST_FAILURE_CHECK,
        LEVEL_UP,
        QUARANTINED_TASKS,
    ];
}

/// Daily stats and history entries kept by a simplified write.
pub const SIMPLIFIED_HISTORY_DAYS: usize = 90;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;
    async fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// SQLite-backed store: one row per key.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `db_path`.
    pub async fn open(db_path: &str) -> Result<Self, CoreError> {
        Ok(Self::new(db::establish_connection(db_path).await?))
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES ($1, $2, $3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM kv_store WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-process store. An optional byte quota makes it behave like a
/// size-limited browser store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose keys and values together may not exceed `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota: Some(quota),
        }
    }

    /// Raw value under `key`, bypassing the trait.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(quota) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(CoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// A record kept under a fixed key.
pub trait Persisted: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;

    /// A smaller version to retry a rejected write with, or `None` when
    /// nothing can be dropped.
    fn simplified(&self) -> Option<Self> {
        None
    }
}

impl Persisted for Vec<StoredTask> {
    const KEY: &'static str = keys::TASKS;

    /// Drops descriptions of completed tasks and failure records.
    fn simplified(&self) -> Option<Self> {
        let mut changed = false;
        let slim = self
            .iter()
            .cloned()
            .map(|mut task| {
                if (task.completed || task.failure.is_some()) && !task.description.is_empty() {
                    task.description.clear();
                    changed = true;
                }
                task
            })
            .collect();
        changed.then_some(slim)
    }
}

impl Persisted for User {
    const KEY: &'static str = keys::USER;
}

impl Persisted for Vec<DailyStats> {
    const KEY: &'static str = keys::DAILY_STATS;

    fn simplified(&self) -> Option<Self> {
        keep_recent(self, |s| s.date)
    }
}

impl Persisted for Vec<TaskHistoryEntry> {
    const KEY: &'static str = keys::TASK_HISTORY;

    fn simplified(&self) -> Option<Self> {
        keep_recent(self, |e| e.date)
    }
}

impl Persisted for QuestTypeRegistry {
    const KEY: &'static str = keys::QUEST_TYPES;
}

/// Date on which failure detection last ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureCheckMarker(pub Option<NaiveDate>);

impl Persisted for FailureCheckMarker {
    const KEY: &'static str = keys::LAST_FAILURE_CHECK;
}

/// Level-up waiting to be dismissed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelUpNotice(pub Option<LevelUp>);

impl Persisted for LevelUpNotice {
    const KEY: &'static str = keys::LEVEL_UP;
}

/// Task records that could not be decoded, kept aside so the next task
/// write does not erase them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuarantinedTasks(pub Vec<StoredTask>);

impl Persisted for QuarantinedTasks {
    const KEY: &'static str = keys::QUARANTINED_TASKS;
}

fn keep_recent<T: Clone>(entries: &[T], date: impl Fn(&T) -> NaiveDate) -> Option<Vec<T>> {
    if entries.len() <= SIMPLIFIED_HISTORY_DAYS {
        return None;
    }
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|e| date(e));
    Some(sorted.split_off(sorted.len() - SIMPLIFIED_HISTORY_DAYS))
}

/// Typed access to the engine's records on top of a [`KeyValueStore`].
#[derive(Debug)]
pub struct Storage<S> {
    store: S,
    timezone: Tz,
    penalties: DifficultyTable,
}

impl<S: KeyValueStore> Storage<S> {
    /// `timezone` and `penalties` are needed to migrate legacy failure
    /// records on load.
    pub fn new(store: S, timezone: Tz, penalties: DifficultyTable) -> Self {
        Self { store, timezone, penalties }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn load<T: Persisted>(&self) -> T {
        let raw = match self.store.get(T::KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(err) => {
                warn!(key = T::KEY, error = ?err, "Failed to read record, using default");
                return T::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(key = T::KEY, error = %err, "Discarding corrupt record, using default");
            T::default()
        })
    }

    /// Writes `value`, retrying once with [`Persisted::simplified`] (or the
    /// same payload) when the store rejects it. Returns whether a write
    /// went through.
    pub async fn save<T: Persisted>(&self, value: &T) -> bool {
        let err = match self.try_write(value).await {
            Ok(()) => return true,
            Err(err) => err,
        };

        warn!(key = T::KEY, error = ?err, "Write rejected, retrying with simplified payload");
        let retried = match value.simplified() {
            Some(slim) => self.try_write(&slim).await,
            None => self.try_write(value).await,
        };

        match retried {
            Ok(()) => true,
            Err(err) => {
                error!(key = T::KEY, error = ?err, "Write failed, state not persisted");
                false
            }
        }
    }

    async fn try_write<T: Persisted>(&self, value: &T) -> Result<(), CoreError> {
        let json = serde_json::to_string(value)?;
        self.store.set(T::KEY, &json).await
    }

    /// Loads the task collection, repairing and migrating records on the way.
    /// Records that do not decode are moved to [`QuarantinedTasks`].
    pub async fn load_tasks(&self, now: DateTime<Utc>) -> Vec<Task> {
        let records: Vec<StoredTask> = self.load().await;
        let (tasks, rejected) = self.decode_tasks(records, now);
        self.quarantine(rejected).await;
        tasks
    }

    /// Adds `records` to the quarantine, replacing earlier copies with the
    /// same id.
    pub async fn quarantine(&self, records: Vec<StoredTask>) {
        if records.is_empty() {
            return;
        }
        let QuarantinedTasks(mut kept) = self.load().await;
        let before = kept.clone();
        for record in records {
            match kept.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => kept.push(record),
            }
        }
        if kept != before {
            warn!(count = kept.len(), "Quarantined undecodable task records");
            self.save(&QuarantinedTasks(kept)).await;
        }
    }

    pub async fn save_tasks(&self, tasks: &[Task]) -> bool {
        let records: Vec<StoredTask> = tasks.iter().cloned().map(StoredTask::from).collect();
        self.save(&records).await
    }

    /// Turns raw records into tasks: legacy failure records are migrated,
    /// legacy instances get the local day they were created on, and
    /// completed records without a completion time get `now`. Records that
    /// still do not form a valid task are returned separately.
    pub fn decode_tasks(&self, mut records: Vec<StoredTask>, now: DateTime<Utc>) -> (Vec<Task>, Vec<StoredTask>) {
        let mut migrated = 0;
        for record in records.iter_mut() {
            if self.migrate_legacy_failure(record) {
                migrated += 1;
            }
            if record.parent_task_id.is_some() && record.occurrence_date.is_none() && record.failure.is_none() {
                record.occurrence_date = Some(local_date(record.created_at, &self.timezone));
            }
        }
        if migrated > 0 {
            warn!(migrated, "Migrated legacy failure records");
        }

        verify_completed_tasks(&mut records, now);

        let mut tasks = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for record in records {
            match Task::try_from(record.clone()) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    warn!(id = %record.id, error = %err, "Setting aside invalid task record");
                    rejected.push(record);
                }
            }
        }
        (tasks, rejected)
    }

    /// Converts a record whose title carries the failure prefix into an
    /// explicit failure record.
    fn migrate_legacy_failure(&self, record: &mut StoredTask) -> bool {
        if record.failure.is_some() {
            return false;
        }
        let Some(title) = record.title.strip_prefix(FAILED_PREFIX) else {
            return false;
        };

        let failed_at = record.completed_at.unwrap_or(record.created_at);
        record.title = title.trim().to_string();
        record.failure = Some(StoredFailure {
            template_id: record.parent_task_id.unwrap_or_else(Uuid::nil),
            penalty: self.penalties.get(record.difficulty),
            missed_date: previous_day(local_date(failed_at, &self.timezone)),
        });
        record.completed = false;
        record.completed_at = Some(failed_at);
        record.is_recurring = false;
        record.recurring_days = None;
        debug!(id = %record.id, "Legacy failure record migrated");
        true
    }

    /// Removes every record.
    pub async fn clear(&self) -> Result<(), CoreError> {
        for key in keys::ALL {
            self.store.remove(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, TaskRecord};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 12, 10, 0, 0).unwrap()
    }

    fn storage(store: MemoryStore) -> Storage<MemoryStore> {
        Storage::new(store, Tz::UTC, DifficultyTable::default_penalties())
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_records_fall_back() {
        let storage = storage(MemoryStore::new());
        let user: User = storage.load().await;
        assert_eq!(user, User::default());

        storage.store().insert_raw(keys::USER, "{not json");
        storage.store().insert_raw(keys::TASKS, "42");
        let user: User = storage.load().await;
        assert_eq!(user.level, 1);
        assert!(storage.load_tasks(now()).await.is_empty());
    }

    #[tokio::test]
    async fn test_tasks_round_trip_through_store() {
        let storage = storage(MemoryStore::new());
        let task = Task {
            title: "Read".into(),
            record: TaskRecord::Completed { completed_at: now() },
            created_at: now(),
            ..Default::default()
        };

        assert!(storage.save_tasks(&[task.clone()]).await);
        assert_eq!(storage.load_tasks(now()).await, vec![task]);
    }

    #[tokio::test]
    async fn test_completed_task_without_timestamp_is_repaired_on_load() {
        let storage = storage(MemoryStore::new());
        let id = Uuid::new_v4();
        storage.store().insert_raw(
            keys::TASKS,
            &serde_json::json!([{
                "id": id,
                "title": "Old",
                "completed": true,
                "createdAt": "2024-03-01T08:00:00Z",
            }])
            .to_string(),
        );

        let tasks = storage.load_tasks(now()).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].completed_at(), Some(now()));
    }

    #[tokio::test]
    async fn test_legacy_failed_prefix_is_migrated() {
        let storage = storage(MemoryStore::new());
        let template_id = Uuid::new_v4();
        storage.store().insert_raw(
            keys::TASKS,
            &serde_json::json!([{
                "id": Uuid::new_v4(),
                "title": "FAILED: Stretch",
                "difficulty": "hard",
                "completed": false,
                "completedAt": "2024-03-11T09:00:00Z",
                "createdAt": "2024-03-11T09:00:00Z",
                "parentTaskId": template_id,
            }])
            .to_string(),
        );

        let tasks = storage.load_tasks(now()).await;
        assert_eq!(tasks[0].title, "Stretch");
        match tasks[0].record {
            TaskRecord::Failed { template_id: id, penalty, missed_date, .. } => {
                assert_eq!(id, template_id);
                assert_eq!(penalty, 20);
                assert_eq!(missed_date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
            }
            ref other => panic!("expected failure record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_legacy_instance_gets_local_creation_day() {
        let tz: Tz = "America/Los_Angeles".parse().unwrap();
        let storage = Storage::new(MemoryStore::new(), tz, DifficultyTable::default_penalties());
        let records = vec![StoredTask {
            id: Uuid::new_v4(),
            title: "Walk".into(),
            description: String::new(),
            difficulty: Difficulty::Easy,
            xp_reward: 10,
            completed: false,
            completed_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 12, 3, 0, 0).unwrap(),
            is_recurring: false,
            recurring_days: None,
            parent_task_id: Some(Uuid::new_v4()),
            occurrence_date: None,
            quest_type: None,
            quest_status: Default::default(),
            failure: None,
        }];

        let (tasks, rejected) = storage.decode_tasks(records, now());
        assert!(rejected.is_empty());
        assert_eq!(tasks[0].occurrence_date(), NaiveDate::from_ymd_opt(2024, 3, 11));
    }

    #[tokio::test]
    async fn test_undecodable_records_survive_the_next_write() {
        let storage = storage(MemoryStore::new());
        let bad_id = Uuid::new_v4();
        let raw = format!(
            r#"[{{"id":"{}","title":"Good","createdAt":"2024-03-12T10:00:00Z"}},
                {{"id":"{}","title":"Odd days","createdAt":"2024-03-12T10:00:00Z","isRecurring":true,"recurringDays":["Funday"]}}]"#,
            Uuid::new_v4(),
            bad_id
        );
        storage.store().insert_raw(keys::TASKS, &raw);

        let tasks = storage.load_tasks(now()).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Good");

        // Writing the decoded collection back does not lose the odd record.
        assert!(storage.save_tasks(&tasks).await);
        let QuarantinedTasks(kept) = storage.load().await;
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, bad_id);
        assert_eq!(kept[0].recurring_days, Some(vec!["Funday".to_string()]));

        // Seeing the same record again does not duplicate it.
        storage.store().insert_raw(keys::TASKS, &raw);
        storage.load_tasks(now()).await;
        let QuarantinedTasks(kept) = storage.load().await;
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_write_retries_simplified() {
        let long = "x".repeat(400);
        let task = Task {
            title: "Done".into(),
            description: long,
            difficulty: Difficulty::Easy,
            record: TaskRecord::Completed { completed_at: now() },
            created_at: now(),
            ..Default::default()
        };

        let storage = storage(MemoryStore::with_quota(400));
        assert!(storage.save_tasks(&[task]).await);

        let loaded = storage.load_tasks(now()).await;
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].description.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let storage = storage(MemoryStore::with_quota(10));
        assert!(!storage.save(&User::default()).await);
        let user: User = storage.load().await;
        assert_eq!(user, User::default());
    }

    #[test]
    fn test_history_simplification_keeps_recent_days() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let stats: Vec<DailyStats> = (0..120)
            .map(|i| DailyStats::empty(start + chrono::Duration::days(i)))
            .collect();

        let slim = stats.simplified().unwrap();
        assert_eq!(slim.len(), SIMPLIFIED_HISTORY_DAYS);
        assert_eq!(slim[0].date, start + chrono::Duration::days(30));
        assert!(stats[..10].to_vec().simplified().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("questr.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();

        assert_eq!(store.get("user").await.unwrap(), None);
        store.set("user", "{}").await.unwrap();
        store.set("user", r#"{"level":3}"#).await.unwrap();
        assert_eq!(store.get("user").await.unwrap().as_deref(), Some(r#"{"level":3}"#));
        store.remove("user").await.unwrap();
        assert_eq!(store.get("user").await.unwrap(), None);
    }
}
