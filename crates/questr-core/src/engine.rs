//! The quest engine: single entry point for every player command.
//!
//! Each command reads the latest persisted state, applies its change through
//! the task store, recurrence engine and streak tracker, recomputes the user
//! aggregate from scratch and writes everything back. Expected invalid
//! transitions are reported as `false`/`None`, never as errors.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::level::LevelCurve;
use crate::models::{
    DailyStats, HistoryTask, LevelUp, NewTaskData, QuestStatus, StoredTask, Task, TaskHistoryEntry,
    TaskKind, TaskRecord, UpdateTaskData, User,
};
use crate::quest_types::QuestTypeRegistry;
use crate::recurrence::{CheckState, RecurrenceEngine};
use crate::storage::{FailureCheckMarker, KeyValueStore, LevelUpNotice, Storage};
use crate::streak::{StreakTracker, StreakUpdate};
use crate::tasks::{TaskStore, UndoOutcome};
use crate::timezone::{local_date, parse_timezone, previous_day};

/// What a `sync` call changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub streak: Option<StreakUpdate>,
    pub failures: Vec<Task>,
    pub generated: Vec<Task>,
    pub level_up: Option<LevelUp>,
}

/// State loaded at the start of a command.
struct Session {
    tasks: TaskStore,
    user: User,
    level_before: u32,
    failure_check: Option<FailureCheckMarker>,
}

#[derive(Debug)]
pub struct QuestEngine<S> {
    storage: Storage<S>,
    config: EngineConfig,
    timezone: Tz,
    curve: LevelCurve,
    streaks: StreakTracker,
    recurrence: RecurrenceEngine,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> QuestEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self, CoreError> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, CoreError> {
        config.validate()?;
        let timezone = parse_timezone(&config.timezone)?;

        Ok(Self {
            storage: Storage::new(store, timezone, config.penalties),
            curve: LevelCurve::new(&config.curve),
            streaks: StreakTracker::new(config.milestones.clone()),
            recurrence: RecurrenceEngine::new(timezone),
            timezone,
            config,
            clock,
        })
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    /// The player's current local calendar day.
    pub fn today(&self) -> NaiveDate {
        self.day_of(self.clock.now())
    }

    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        local_date(instant, &self.timezone)
    }

    async fn load_session(&self, now: DateTime<Utc>) -> Session {
        let tasks = TaskStore::new(self.storage.load_tasks(now).await);
        let user: User = self.storage.load().await;
        Session {
            level_before: user.level,
            tasks,
            user,
            failure_check: None,
        }
    }

    /// Recomputes the user aggregate and persists the session.
    async fn commit(&self, session: &mut Session) -> Option<LevelUp> {
        session.tasks.recompute_user(&mut session.user, &self.curve);
        let level_up = self.update_level_notice(session.level_before, session.user.level).await;

        self.storage.save_tasks(session.tasks.tasks()).await;
        self.storage.save(&session.user).await;
        if let Some(marker) = session.failure_check.take() {
            self.storage.save(&marker).await;
        }
        level_up
    }

    /// Compares the new level against the pending notice (or, without one,
    /// the level at the start of the command) and stores the result.
    async fn update_level_notice(&self, level_before: u32, level_after: u32) -> Option<LevelUp> {
        let LevelUpNotice(pending) = self.storage.load().await;
        let baseline = pending.map_or(level_before, |notice| notice.old_level);

        let next = (level_after > baseline).then_some(LevelUp {
            old_level: baseline,
            new_level: level_after,
        });

        if next != pending {
            if let Some(level_up) = next {
                if pending.map_or(true, |p| p.new_level < level_up.new_level) {
                    info!(old_level = level_up.old_level, new_level = level_up.new_level, "Level up");
                }
            }
            self.storage.save(&LevelUpNotice(next)).await;
        }
        next
    }

    // ---- commands -------------------------------------------------------

    /// Creates a quest. A recurring quest scheduled for today gets its
    /// instance right away.
    pub async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let now = self.clock.now();
        let mut session = self.load_session(now).await;

        let task = session.tasks.add_task(data, &self.config.rewards, now)?;
        self.schedule_today(&mut session, &task, now);

        self.register_quest_type(task.quest_type.as_deref()).await;
        self.commit(&mut session).await;
        info!(id = %task.id, title = %task.title, "Quest added");
        Ok(task)
    }

    /// Completes a quest. A pending day rollover is applied first so the
    /// streak reflects the day the completion happened on. A rejected
    /// completion writes nothing, rollover included.
    pub async fn complete_task(&self, id: Uuid) -> bool {
        let now = self.clock.now();
        let today = self.day_of(now);
        let mut session = self.load_session(now).await;

        if !session.tasks.is_completable(id) {
            return false;
        }

        self.roll_over_in(&mut session, today).await;

        if !session.tasks.complete_task(id, now) {
            return false;
        }

        if let Some(update) = self.streaks.mark_active(&mut session.user, today) {
            self.credit_milestones(today, &update).await;
        }

        if let Some(task) = session.tasks.get(id).cloned() {
            self.adjust_daily_stats(today, 1, i64::from(task.xp_reward)).await;
            self.record_history(today, &task, now).await;
            info!(%id, title = %task.title, xp = task.xp_reward, "Quest completed");
        }

        self.commit(&mut session).await;
        true
    }

    /// Reverts a completion, or removes a failure record and reinstates the
    /// missed occurrence.
    pub async fn undo_task(&self, id: Uuid) -> bool {
        let now = self.clock.now();
        let mut session = self.load_session(now).await;

        match session.tasks.undo_task(id) {
            UndoOutcome::Rejected => return false,
            UndoOutcome::Reverted { task, completed_at } => {
                let day = self.day_of(completed_at);
                if day == self.day_of(now) {
                    self.adjust_daily_stats(day, -1, -i64::from(task.xp_reward)).await;
                    self.remove_history(day, task.id).await;
                } else {
                    debug!(%id, completed_on = %day, "Completion from an earlier day, ledgers kept");
                }
                info!(%id, title = %task.title, "Completion undone");
            }
            UndoOutcome::FailureRemoved(failure) => {
                if let TaskRecord::Failed { template_id, penalty, missed_date, failed_at } = failure.record {
                    self.adjust_daily_stats(self.day_of(failed_at), 0, i64::from(penalty)).await;
                    self.reinstate_occurrence(&mut session, template_id, missed_date, now);
                    info!(%id, title = %failure.title, penalty, "Failure undone, penalty reversed");
                }
            }
        }

        self.commit(&mut session).await;
        true
    }

    fn reinstate_occurrence(&self, session: &mut Session, template_id: Uuid, day: NaiveDate, now: DateTime<Utc>) {
        let Some(template) = session.tasks.get(template_id).filter(|t| t.is_template()).cloned() else {
            debug!(%template_id, "Template gone, nothing to reinstate");
            return;
        };
        if self.recurrence.instances_for_day(session.tasks.tasks(), template_id, day).is_empty() {
            session.tasks.push(self.recurrence.instantiate(&template, day, now));
        }
    }

    pub async fn delete_task(&self, id: Uuid) -> bool {
        let now = self.clock.now();
        let mut session = self.load_session(now).await;

        let Some(task) = session.tasks.delete_task(id) else {
            debug!(%id, "Delete rejected: unknown task");
            return false;
        };

        self.commit(&mut session).await;
        info!(%id, title = %task.title, "Quest deleted");
        true
    }

    /// `Ok(None)` for unknown ids and failure records; `Err` for invalid
    /// field values.
    pub async fn edit_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Option<Task>, CoreError> {
        let now = self.clock.now();
        let mut session = self.load_session(now).await;

        let Some(task) = session.tasks.edit_task(id, data, &self.config.rewards)? else {
            return Ok(None);
        };
        self.schedule_today(&mut session, &task, now);

        self.register_quest_type(task.quest_type.as_deref()).await;
        self.commit(&mut session).await;
        debug!(%id, "Quest edited");
        Ok(Some(task))
    }

    pub async fn copy_task(&self, id: Uuid) -> Option<Task> {
        let now = self.clock.now();
        let mut session = self.load_session(now).await;

        let copy = session.tasks.copy_task(id, now)?;
        self.schedule_today(&mut session, &copy, now);
        self.commit(&mut session).await;
        Some(copy)
    }

    /// Gives a template scheduled for today its instance when it has none.
    fn schedule_today(&self, session: &mut Session, task: &Task, now: DateTime<Utc>) {
        if !task.is_template() {
            return;
        }
        let today = self.day_of(now);
        if let Some(instance) = self.recurrence.instance_if_missing(session.tasks.tasks(), task, today, now) {
            debug!(template_id = %task.id, "Created today's instance");
            session.tasks.push(instance);
        }
    }

    pub async fn hide_task(&self, id: Uuid) -> bool {
        self.set_visibility(id, true).await
    }

    pub async fn unhide_task(&self, id: Uuid) -> bool {
        self.set_visibility(id, false).await
    }

    async fn set_visibility(&self, id: Uuid, hidden: bool) -> bool {
        let now = self.clock.now();
        let mut session = self.load_session(now).await;

        let changed = if hidden {
            session.tasks.hide_task(id)
        } else {
            session.tasks.unhide_task(id)
        };
        if changed {
            self.commit(&mut session).await;
        }
        changed
    }

    /// Penalizes a template for missing yesterday's occurrence. `None` for
    /// non-templates and when yesterday is already penalized.
    pub async fn fail_recurring_task(&self, template_id: Uuid) -> Option<Task> {
        let now = self.clock.now();
        let today = self.day_of(now);
        let mut session = self.load_session(now).await;

        let failure = self
            .fail_in(&mut session, template_id, previous_day(today), now, today)
            .await?;
        self.commit(&mut session).await;
        Some(failure)
    }

    async fn fail_in(
        &self,
        session: &mut Session,
        template_id: Uuid,
        missed_date: NaiveDate,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Option<Task> {
        let Some(template) = session.tasks.get(template_id).filter(|t| t.is_template()).cloned() else {
            debug!(%template_id, "Fail rejected: not a recurring template");
            return None;
        };

        let already_failed = session.tasks.tasks().iter().any(|t| {
            matches!(t.record, TaskRecord::Failed { template_id: id, missed_date: day, .. }
                if id == template_id && day == missed_date)
        });
        if already_failed {
            debug!(%template_id, %missed_date, "Fail rejected: occurrence already penalized");
            return None;
        }

        // The failure record replaces the open instance for that day.
        session.tasks.retain(|t| {
            !(t.parent_task_id() == Some(template_id)
                && t.occurrence_date() == Some(missed_date)
                && t.record == TaskRecord::Active)
        });

        let penalty = self.config.penalties.get(template.difficulty);
        let failure = Task {
            id: Uuid::new_v4(),
            title: template.title.clone(),
            description: template.description.clone(),
            difficulty: template.difficulty,
            xp_reward: template.xp_reward,
            kind: TaskKind::Standalone,
            record: TaskRecord::Failed {
                template_id,
                penalty,
                missed_date,
                failed_at: now,
            },
            created_at: now,
            quest_type: template.quest_type.clone(),
            quest_status: QuestStatus::Active,
        };
        session.tasks.push(failure.clone());
        self.adjust_daily_stats(today, 0, -i64::from(penalty)).await;

        info!(template = %template.title, penalty, %missed_date, "Recurring quest missed");
        Some(failure)
    }

    /// Penalizes every template left unmet yesterday. Runs at most once per
    /// day.
    pub async fn check_for_failed_tasks(&self) -> Vec<Task> {
        let now = self.clock.now();
        let today = self.day_of(now);
        let mut session = self.load_session(now).await;

        let failures = self.check_failures_in(&mut session, now, today).await;
        if session.failure_check.is_some() {
            self.commit(&mut session).await;
        }
        failures
    }

    async fn check_failures_in(&self, session: &mut Session, now: DateTime<Utc>, today: NaiveDate) -> Vec<Task> {
        let FailureCheckMarker(last_failure_check) = self.storage.load().await;
        let mut checks = CheckState {
            last_recurring_check: session.user.last_recurring_check,
            last_failure_check,
        };

        let Some(missed) = self.recurrence.find_missed(session.tasks.tasks(), &mut checks, today) else {
            return Vec::new();
        };

        let mut failures = Vec::with_capacity(missed.len());
        for occurrence in missed {
            if let Some(failure) = self
                .fail_in(session, occurrence.template.id, occurrence.missed_date, now, today)
                .await
            {
                failures.push(failure);
            }
        }

        session.failure_check = Some(FailureCheckMarker(checks.last_failure_check));
        failures
    }

    /// Creates today's instances of scheduled templates. Runs at most once
    /// per day.
    pub async fn generate_for_today(&self) -> Vec<Task> {
        let now = self.clock.now();
        let today = self.day_of(now);
        let mut session = self.load_session(now).await;

        match self.generate_in(&mut session, now, today) {
            Some(created) => {
                self.commit(&mut session).await;
                created
            }
            None => Vec::new(),
        }
    }

    fn generate_in(&self, session: &mut Session, now: DateTime<Utc>, today: NaiveDate) -> Option<Vec<Task>> {
        let mut checks = CheckState {
            last_recurring_check: session.user.last_recurring_check,
            last_failure_check: None,
        };
        let created = self
            .recurrence
            .generate_for_today(session.tasks.tasks(), &mut checks, today, now)?;

        session.user.last_recurring_check = checks.last_recurring_check;
        session.tasks.extend(created.iter().cloned());
        Some(created)
    }

    /// Applies a pending day rollover to the streak.
    pub async fn process_day_rollover(&self) -> (Option<StreakUpdate>, Option<LevelUp>) {
        let now = self.clock.now();
        let today = self.day_of(now);
        let mut session = self.load_session(now).await;

        let update = self.roll_over_in(&mut session, today).await;
        let level_up = self.commit(&mut session).await;
        (update, level_up)
    }

    async fn roll_over_in(&self, session: &mut Session, today: NaiveDate) -> Option<StreakUpdate> {
        let update = self.streaks.roll_over(&mut session.user, today)?;
        self.credit_milestones(today, &update).await;
        Some(update)
    }

    /// Start-of-session routine: rollover, then yesterday's failures, then
    /// today's instances.
    pub async fn sync(&self) -> SyncReport {
        let now = self.clock.now();
        let today = self.day_of(now);
        let mut session = self.load_session(now).await;

        let streak = self.roll_over_in(&mut session, today).await;
        let failures = self.check_failures_in(&mut session, now, today).await;
        let generated = self.generate_in(&mut session, now, today).unwrap_or_default();
        let level_up = self.commit(&mut session).await;

        info!(
            failures = failures.len(),
            generated = generated.len(),
            streak = session.user.streak_days,
            "Synced"
        );

        SyncReport {
            streak,
            failures,
            generated,
            level_up,
        }
    }

    /// Registers a quest-type label. `false` for blank or known labels.
    pub async fn add_quest_type(&self, label: &str) -> bool {
        let mut registry: QuestTypeRegistry = self.storage.load().await;
        if !registry.add(label) {
            debug!(label, "Quest type rejected: blank or already known");
            return false;
        }
        self.storage.save(&registry).await;
        true
    }

    async fn register_quest_type(&self, label: Option<&str>) {
        if let Some(label) = label {
            let mut registry: QuestTypeRegistry = self.storage.load().await;
            if registry.add(label) {
                self.storage.save(&registry).await;
            }
        }
    }

    /// Clears the level-up notification; the current level becomes the
    /// baseline for the next one.
    pub async fn dismiss_level_up(&self) {
        self.storage.save(&LevelUpNotice(None)).await;
    }

    /// Replaces the whole task collection, e.g. from an import. Records are
    /// repaired the same way as on load, and open duplicate instances are
    /// dropped. Returns the number of tasks kept.
    pub async fn replace_tasks(&self, records: Vec<StoredTask>) -> usize {
        let now = self.clock.now();
        let (mut tasks, rejected) = self.storage.decode_tasks(records, now);
        self.storage.quarantine(rejected).await;

        let shadowed = self.recurrence.duplicate_instance_ids(&tasks);
        tasks.retain(|t| t.is_completed() || !shadowed.contains(&t.id));

        for label in tasks.iter().filter_map(|t| t.quest_type.clone()) {
            self.register_quest_type(Some(&label)).await;
        }

        let user: User = self.storage.load().await;
        let mut session = Session {
            level_before: user.level,
            tasks: TaskStore::new(tasks),
            user,
            failure_check: None,
        };
        self.commit(&mut session).await;

        let kept = session.tasks.tasks().len();
        info!(kept, "Task collection replaced");
        kept
    }

    /// Restores every record to its default.
    pub async fn reset(&self) -> bool {
        match self.storage.clear().await {
            Ok(()) => {
                info!("All data reset");
                true
            }
            Err(err) => {
                warn!(error = ?err, "Reset failed");
                false
            }
        }
    }

    // ---- ledgers --------------------------------------------------------

    async fn credit_milestones(&self, day: NaiveDate, update: &StreakUpdate) {
        if update.bonus_xp > 0 {
            let bonus = i64::try_from(update.bonus_xp).unwrap_or(i64::MAX);
            self.adjust_daily_stats(day, 0, bonus).await;
        }
    }

    async fn adjust_daily_stats(&self, day: NaiveDate, completed: i32, xp: i64) {
        let mut stats: Vec<DailyStats> = self.storage.load().await;

        let index = match stats.iter().position(|s| s.date == day) {
            Some(index) => index,
            None if completed < 0 => return,
            None => {
                stats.push(DailyStats::empty(day));
                stats.sort_by_key(|s| s.date);
                match stats.iter().position(|s| s.date == day) {
                    Some(index) => index,
                    None => return,
                }
            }
        };

        let entry = &mut stats[index];
        entry.tasks_completed = entry.tasks_completed.saturating_add_signed(completed);
        entry.xp_gained += xp;
        self.storage.save(&stats).await;
    }

    async fn record_history(&self, day: NaiveDate, task: &Task, completed_at: DateTime<Utc>) {
        let mut history: Vec<TaskHistoryEntry> = self.storage.load().await;
        let item = HistoryTask {
            id: task.id,
            title: task.title.clone(),
            xp_reward: task.xp_reward,
            completed_at,
        };

        match history.iter_mut().find(|e| e.date == day) {
            Some(entry) => entry.tasks.push(item),
            None => {
                history.push(TaskHistoryEntry { date: day, tasks: vec![item] });
                history.sort_by_key(|e| e.date);
            }
        }
        self.storage.save(&history).await;
    }

    async fn remove_history(&self, day: NaiveDate, id: Uuid) {
        let mut history: Vec<TaskHistoryEntry> = self.storage.load().await;
        let Some(entry) = history.iter_mut().find(|e| e.date == day) else {
            return;
        };
        entry.tasks.retain(|t| t.id != id);
        history.retain(|e| !e.tasks.is_empty());
        self.storage.save(&history).await;
    }

    // ---- read model -----------------------------------------------------

    pub async fn tasks(&self) -> Vec<Task> {
        self.storage.load_tasks(self.clock.now()).await
    }

    /// Default view: everything except templates, hidden quests and
    /// shadowed duplicate instances.
    pub async fn visible_tasks(&self) -> Vec<Task> {
        let tasks = self.tasks().await;
        self.recurrence
            .dedupe_instances(&tasks)
            .into_iter()
            .filter(|t| !t.is_template() && !t.is_hidden())
            .cloned()
            .collect()
    }

    /// Today's instances plus open standalone quests.
    pub async fn today_tasks(&self) -> Vec<Task> {
        let today = self.today();
        let tasks = self.tasks().await;
        self.recurrence
            .dedupe_instances(&tasks)
            .into_iter()
            .filter(|t| !t.is_hidden())
            .filter(|t| match t.kind {
                TaskKind::Instance { occurrence_date, .. } => occurrence_date == today,
                TaskKind::Standalone => !t.is_failure() && t.quest_status == QuestStatus::Active,
                TaskKind::Template { .. } => false,
            })
            .cloned()
            .collect()
    }

    pub async fn find_task(&self, id: Uuid) -> Option<Task> {
        self.tasks().await.into_iter().find(|t| t.id == id)
    }

    /// Tasks whose id starts with `prefix` (case-insensitive, hyphens ignored).
    pub async fn find_tasks_by_short_id_prefix(&self, prefix: &str) -> Vec<Task> {
        let needle: String = prefix.chars().filter(|c| *c != '-').collect::<String>().to_lowercase();
        self.tasks()
            .await
            .into_iter()
            .filter(|t| t.id.simple().to_string().starts_with(&needle))
            .collect()
    }

    /// The user aggregate, recomputed from the current collection.
    pub async fn user(&self) -> User {
        let tasks = TaskStore::new(self.tasks().await);
        let mut user: User = self.storage.load().await;
        tasks.recompute_user(&mut user, &self.curve);
        user
    }

    pub async fn quest_types(&self) -> QuestTypeRegistry {
        self.storage.load().await
    }

    pub async fn level_up(&self) -> Option<LevelUp> {
        let LevelUpNotice(pending) = self.storage.load().await;
        pending
    }

    pub async fn daily_stats(&self) -> Vec<DailyStats> {
        self.storage.load().await
    }

    pub async fn task_history(&self) -> Vec<TaskHistoryEntry> {
        self.storage.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::Difficulty;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Weekday};

    fn clock() -> Arc<FixedClock> {
        // Wednesday
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 8, 9, 0, 0).unwrap()))
    }

    fn engine(clock: &Arc<FixedClock>) -> QuestEngine<MemoryStore> {
        QuestEngine::with_clock(MemoryStore::new(), EngineConfig::default(), clock.clone()).unwrap()
    }

    fn quest(title: &str, difficulty: Difficulty) -> NewTaskData {
        NewTaskData {
            title: title.to_string(),
            difficulty,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_invalid_timezone() {
        let result = QuestEngine::new(MemoryStore::new(), EngineConfig::with_timezone("Nowhere/Land"));
        assert!(matches!(result, Err(CoreError::InvalidTimezone(_))));
    }

    #[tokio::test]
    async fn test_complete_updates_aggregate_and_ledgers() {
        let clock = clock();
        let engine = engine(&clock);
        let task = engine.add_task(quest("Write", Difficulty::Medium)).await.unwrap();

        assert!(engine.complete_task(task.id).await);

        let user = engine.user().await;
        assert_eq!(user.total_xp, 25);
        assert_eq!(user.tasks_completed, 1);
        assert_eq!(user.streak_days, 1);

        let stats = engine.daily_stats().await;
        assert_eq!(stats, vec![DailyStats { date: engine.today(), tasks_completed: 1, xp_gained: 25 }]);
        let history = engine.task_history().await;
        assert_eq!(history[0].tasks[0].id, task.id);
    }

    #[tokio::test]
    async fn test_undo_reverses_ledgers() {
        let clock = clock();
        let engine = engine(&clock);
        let task = engine.add_task(quest("Write", Difficulty::Medium)).await.unwrap();
        engine.complete_task(task.id).await;

        assert!(engine.undo_task(task.id).await);
        assert!(!engine.undo_task(task.id).await);

        assert_eq!(engine.user().await.total_xp, 0);
        assert_eq!(engine.daily_stats().await[0].tasks_completed, 0);
        assert!(engine.task_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_level_up_notice_until_dismissed() {
        let clock = clock();
        let engine = engine(&clock);
        let big = engine.add_task(quest("Ship release", Difficulty::Hard)).await.unwrap();

        engine.complete_task(big.id).await;
        assert_eq!(engine.level_up().await, Some(LevelUp { old_level: 1, new_level: 2 }));

        engine.dismiss_level_up().await;
        assert_eq!(engine.level_up().await, None);

        // Undo drops back below the baseline: no notice.
        engine.undo_task(big.id).await;
        assert_eq!(engine.level_up().await, None);
    }

    #[tokio::test]
    async fn test_recurring_template_gets_todays_instance() {
        let clock = clock();
        let engine = engine(&clock);
        let template = engine
            .add_task(NewTaskData {
                title: "Journal".into(),
                is_recurring: true,
                recurring_days: vec![Weekday::Wed],
                ..Default::default()
            })
            .await
            .unwrap();

        let today = engine.today_tasks().await;
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].parent_task_id(), Some(template.id));

        // Generation later that day finds the instance already there.
        assert!(engine.generate_for_today().await.is_empty());
        assert_eq!(engine.tasks().await.len(), 2);
    }

    #[tokio::test]
    async fn test_quest_types_register_from_tasks() {
        let clock = clock();
        let engine = engine(&clock);
        engine
            .add_task(NewTaskData { title: "Run".into(), quest_type: Some("fitness".into()), ..Default::default() })
            .await
            .unwrap();

        assert!(!engine.add_quest_type("Fitness").await);
        assert!(engine.add_quest_type("work").await);
        let labels: Vec<String> = engine.quest_types().await.labels().map(str::to_string).collect();
        assert_eq!(labels, vec!["FITNESS", "WORK"]);
    }
}
