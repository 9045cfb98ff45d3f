//! The task collection and its consistency-preserving mutations.
//!
//! `TaskStore` owns an in-memory `Vec<Task>`; the engine loads it from the
//! key-value store at the start of every command and writes it back after.
//! Totals are always recomputed from the whole collection.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DifficultyTable;
use crate::error::CoreError;
use crate::level::LevelCurve;
use crate::models::{
    NewTaskData, QuestStatus, StoredTask, Task, TaskKind, TaskRecord, UpdateTaskData, User,
    WeekdaySet,
};
use crate::quest_types::normalize_quest_type;

/// Suffix appended to the title of a copied task.
pub const COPY_SUFFIX: &str = " (Copy)";

/// Aggregates derived from the whole collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Σ reward over completed tasks
    pub earned_xp: u64,
    pub tasks_completed: u32,
    pub tasks_failed: u32,
    /// Σ penalty over failure records
    pub failed_xp: u64,
}

/// Result of `undo_task`.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoOutcome {
    /// A completed task went back to active
    Reverted {
        task: Task,
        completed_at: DateTime<Utc>,
    },
    /// A failure record was removed; the caller reverses the penalty
    FailureRemoved(Task),
    /// Unknown id, or the task was not in an undoable state
    Rejected,
}

#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn extend(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    /// Keeps only the tasks for which `keep` returns true; returns how many
    /// were dropped.
    pub fn retain(&mut self, keep: impl FnMut(&Task) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(keep);
        before - self.tasks.len()
    }

    pub fn templates(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_template())
    }

    /// Creates a standalone task, or a template when `is_recurring` is set.
    pub fn add_task(
        &mut self,
        data: NewTaskData,
        rewards: &DifficultyTable,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        let title = data.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::InvalidInput("Title cannot be empty".to_string()));
        }

        let kind = if data.is_recurring {
            template_kind(&data.recurring_days)?
        } else {
            TaskKind::Standalone
        };

        let task = Task {
            id: Uuid::new_v4(),
            title,
            description: data.description,
            difficulty: data.difficulty,
            xp_reward: rewards.get(data.difficulty),
            kind,
            record: TaskRecord::Active,
            created_at: now,
            quest_type: data.quest_type.as_deref().and_then(normalize_quest_type),
            quest_status: QuestStatus::Active,
        };

        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Marks a task completed. Returns `false` without touching anything for
    /// unknown ids, templates, failure records and tasks already completed.
    /// True for an existing standalone quest or instance that is still open.
    pub fn is_completable(&self, id: Uuid) -> bool {
        match self.get(id) {
            None => {
                debug!(%id, "Complete rejected: unknown task");
                false
            }
            Some(task) if task.is_template() || task.is_failure() || task.is_completed() => {
                debug!(%id, title = %task.title, "Complete rejected: task is not completable");
                false
            }
            Some(_) => true,
        }
    }

    pub fn complete_task(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        if !self.is_completable(id) {
            return false;
        }
        let Some(task) = self.get_mut(id) else {
            return false;
        };

        task.record = TaskRecord::Completed { completed_at: now };
        task.quest_status = QuestStatus::Completed;
        true
    }

    pub fn undo_task(&mut self, id: Uuid) -> UndoOutcome {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            debug!(%id, "Undo rejected: unknown task");
            return UndoOutcome::Rejected;
        };

        if self.tasks[index].is_failure() {
            return UndoOutcome::FailureRemoved(self.tasks.remove(index));
        }

        let task = &mut self.tasks[index];
        let TaskRecord::Completed { completed_at } = task.record else {
            debug!(%id, "Undo rejected: task is not completed");
            return UndoOutcome::Rejected;
        };

        task.record = TaskRecord::Active;
        if task.quest_status == QuestStatus::Completed {
            task.quest_status = QuestStatus::Active;
        }
        UndoOutcome::Reverted {
            task: task.clone(),
            completed_at,
        }
    }

    pub fn delete_task(&mut self, id: Uuid) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    /// Replaces the mutable fields of a task. The reward is recomputed from
    /// the resulting difficulty; `quest_status` is preserved.
    ///
    /// `Ok(None)` for unknown ids and failure records.
    pub fn edit_task(
        &mut self,
        id: Uuid,
        data: UpdateTaskData,
        rewards: &DifficultyTable,
    ) -> Result<Option<Task>, CoreError> {
        let Some(task) = self.get_mut(id) else {
            debug!(%id, "Edit rejected: unknown task");
            return Ok(None);
        };
        if task.is_failure() {
            debug!(%id, "Edit rejected: failure records are read-only");
            return Ok(None);
        }

        let title = match data.title {
            Some(title) if title.trim().is_empty() => {
                return Err(CoreError::InvalidInput("Title cannot be empty".to_string()))
            }
            Some(title) => title.trim().to_string(),
            None => task.title.clone(),
        };

        let kind = match (&task.kind, data.is_recurring, data.recurring_days) {
            (TaskKind::Instance { .. }, Some(true), _) => {
                return Err(CoreError::InvalidInput(
                    "A recurring instance cannot itself become recurring".to_string(),
                ))
            }
            (TaskKind::Template { .. }, Some(false), _) => TaskKind::Standalone,
            (TaskKind::Template { recurring_days }, None | Some(true), None) => TaskKind::Template {
                recurring_days: *recurring_days,
            },
            (TaskKind::Template { .. }, None | Some(true), Some(days))
            | (TaskKind::Standalone, Some(true), Some(days)) => template_kind(&days)?,
            (TaskKind::Standalone, Some(true), None) => {
                return Err(CoreError::InvalidInput(
                    "Recurring quests need at least one weekday".to_string(),
                ))
            }
            (kind, _, _) => kind.clone(),
        };

        if task.is_completed() && matches!(kind, TaskKind::Template { .. }) {
            return Err(CoreError::InvalidInput(
                "A completed quest cannot become recurring".to_string(),
            ));
        }

        task.title = title;
        task.kind = kind;
        if let Some(description) = data.description {
            task.description = description;
        }
        if let Some(difficulty) = data.difficulty {
            task.difficulty = difficulty;
        }
        task.xp_reward = rewards.get(task.difficulty);
        if let Some(quest_type) = data.quest_type {
            task.quest_type = quest_type.as_deref().and_then(normalize_quest_type);
        }

        Ok(Some(task.clone()))
    }

    /// Clones a task under a new id with completion state reset. Instances
    /// are copied as standalone quests; failure records cannot be copied.
    pub fn copy_task(&mut self, id: Uuid, now: DateTime<Utc>) -> Option<Task> {
        let original = self.get(id)?;
        if original.is_failure() {
            debug!(%id, "Copy rejected: failure records cannot be copied");
            return None;
        }

        let kind = match &original.kind {
            TaskKind::Instance { .. } => TaskKind::Standalone,
            other => other.clone(),
        };

        let copy = Task {
            id: Uuid::new_v4(),
            title: format!("{}{}", original.title, COPY_SUFFIX),
            description: original.description.clone(),
            difficulty: original.difficulty,
            xp_reward: original.xp_reward,
            kind,
            record: TaskRecord::Active,
            created_at: now,
            quest_type: original.quest_type.clone(),
            quest_status: QuestStatus::Active,
        };

        self.tasks.push(copy.clone());
        Some(copy)
    }

    pub fn hide_task(&mut self, id: Uuid) -> bool {
        match self.get_mut(id) {
            Some(task) if task.quest_status == QuestStatus::Active => {
                task.quest_status = QuestStatus::Hidden;
                true
            }
            _ => {
                debug!(%id, "Hide rejected: task is missing or not active");
                false
            }
        }
    }

    pub fn unhide_task(&mut self, id: Uuid) -> bool {
        match self.get_mut(id) {
            Some(task) if task.quest_status == QuestStatus::Hidden => {
                task.quest_status = if task.is_completed() {
                    QuestStatus::Completed
                } else {
                    QuestStatus::Active
                };
                true
            }
            _ => {
                debug!(%id, "Unhide rejected: task is missing or not hidden");
                false
            }
        }
    }

    pub fn totals(&self) -> Totals {
        self.tasks.iter().fold(Totals::default(), |mut acc, task| {
            match task.record {
                TaskRecord::Completed { .. } => {
                    acc.earned_xp += u64::from(task.xp_reward);
                    acc.tasks_completed += 1;
                }
                TaskRecord::Failed { penalty, .. } => {
                    acc.failed_xp += u64::from(penalty);
                    acc.tasks_failed += 1;
                }
                TaskRecord::Active => {}
            }
            acc
        })
    }

    /// Rebuilds every derived field of `user` from the collection, the
    /// milestone ledger and the level curve.
    ///
    /// A negative raw balance (penalties exceeding everything earned) pins
    /// the level at 0; `xp_to_next_level` then holds the debt to repay.
    pub fn recompute_user(&self, user: &mut User, curve: &LevelCurve) {
        let totals = self.totals();
        user.tasks_completed = totals.tasks_completed;
        user.tasks_failed = totals.tasks_failed;
        user.failed_xp = totals.failed_xp;

        let raw = i128::from(totals.earned_xp) + i128::from(user.bonus_xp) - i128::from(totals.failed_xp);
        if raw < 0 {
            user.level = 0;
            user.total_xp = 0;
            user.xp = 0;
            user.xp_to_next_level = u64::try_from(-raw).unwrap_or(u64::MAX);
        } else {
            let total = u64::try_from(raw).unwrap_or(u64::MAX);
            user.total_xp = total;
            user.level = curve.level_for(total);
            user.xp = curve.xp_within_level(total);
            user.xp_to_next_level = curve.xp_to_next_level(total);
        }
    }
}

fn template_kind(days: &[chrono::Weekday]) -> Result<TaskKind, CoreError> {
    let recurring_days: WeekdaySet = days.iter().copied().collect();
    if recurring_days.is_empty() {
        return Err(CoreError::InvalidInput(
            "Recurring quests need at least one weekday".to_string(),
        ));
    }
    Ok(TaskKind::Template { recurring_days })
}

/// Assigns `fallback` to completed tasks that lack a completion time.
///
/// Must run after every load and every bulk replacement, before the records
/// are converted into [`Task`]s. Returns the number of repaired records.
pub fn verify_completed_tasks(tasks: &mut [StoredTask], fallback: DateTime<Utc>) -> usize {
    let mut repaired = 0;
    for task in tasks.iter_mut() {
        if task.completed && task.completed_at.is_none() && task.failure.is_none() {
            warn!(id = %task.id, title = %task.title, "Completed task had no completion time, repairing");
            task.completed_at = Some(fallback);
            repaired += 1;
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use chrono::{TimeZone, Weekday};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
    }

    fn rewards() -> DifficultyTable {
        DifficultyTable::default_rewards()
    }

    fn add(store: &mut TaskStore, title: &str, difficulty: Difficulty) -> Task {
        store
            .add_task(
                NewTaskData { title: title.to_string(), difficulty, ..Default::default() },
                &rewards(),
                now(),
            )
            .unwrap()
    }

    fn template(store: &mut TaskStore, title: &str) -> Task {
        store
            .add_task(
                NewTaskData {
                    title: title.to_string(),
                    is_recurring: true,
                    recurring_days: vec![Weekday::Mon],
                    ..Default::default()
                },
                &rewards(),
                now(),
            )
            .unwrap()
    }

    #[test]
    fn test_add_task_captures_reward() {
        let mut store = TaskStore::default();
        let task = add(&mut store, "Write report", Difficulty::Hard);
        assert_eq!(task.xp_reward, 50);
        assert_eq!(task.quest_status, QuestStatus::Active);
        assert_eq!(store.tasks().len(), 1);
    }

    #[test]
    fn test_add_task_validation() {
        let mut store = TaskStore::default();
        let empty = store.add_task(NewTaskData { title: "  ".into(), ..Default::default() }, &rewards(), now());
        assert!(matches!(empty, Err(CoreError::InvalidInput(_))));

        let no_days = store.add_task(
            NewTaskData { title: "Gym".into(), is_recurring: true, ..Default::default() },
            &rewards(),
            now(),
        );
        assert!(matches!(no_days, Err(CoreError::InvalidInput(_))));
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn test_quest_type_is_uppercased() {
        let mut store = TaskStore::default();
        let task = store
            .add_task(
                NewTaskData { title: "Run".into(), quest_type: Some("fitness".into()), ..Default::default() },
                &rewards(),
                now(),
            )
            .unwrap();
        assert_eq!(task.quest_type.as_deref(), Some("FITNESS"));
    }

    #[test]
    fn test_complete_task_rejections() {
        let mut store = TaskStore::default();
        let task = add(&mut store, "Read", Difficulty::Easy);
        let tmpl = template(&mut store, "Drink Water");

        assert!(!store.complete_task(Uuid::new_v4(), now()));
        assert!(!store.complete_task(tmpl.id, now()));
        assert!(store.complete_task(task.id, now()));
        assert!(!store.complete_task(task.id, now()));

        let completed = store.get(task.id).unwrap();
        assert_eq!(completed.completed_at(), Some(now()));
        assert_eq!(completed.quest_status, QuestStatus::Completed);
    }

    #[test]
    fn test_undo_restores_active() {
        let mut store = TaskStore::default();
        let task = add(&mut store, "Read", Difficulty::Easy);
        store.complete_task(task.id, now());

        match store.undo_task(task.id) {
            UndoOutcome::Reverted { task: reverted, completed_at } => {
                assert_eq!(completed_at, now());
                assert_eq!(reverted.record, TaskRecord::Active);
                assert_eq!(reverted.quest_status, QuestStatus::Active);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.undo_task(task.id), UndoOutcome::Rejected);
    }

    #[test]
    fn test_edit_recomputes_reward_and_keeps_status() {
        let mut store = TaskStore::default();
        let task = add(&mut store, "Read", Difficulty::Easy);
        store.hide_task(task.id);

        let edited = store
            .edit_task(
                task.id,
                UpdateTaskData {
                    title: Some("Read a book".into()),
                    difficulty: Some(Difficulty::Medium),
                    ..Default::default()
                },
                &rewards(),
            )
            .unwrap()
            .unwrap();

        assert_eq!(edited.title, "Read a book");
        assert_eq!(edited.xp_reward, 25);
        assert_eq!(edited.quest_status, QuestStatus::Hidden);
    }

    #[test]
    fn test_edit_converts_between_kinds() {
        let mut store = TaskStore::default();
        let task = add(&mut store, "Stretch", Difficulty::Easy);

        let no_days = store.edit_task(
            task.id,
            UpdateTaskData { is_recurring: Some(true), ..Default::default() },
            &rewards(),
        );
        assert!(no_days.is_err());

        let tmpl = store
            .edit_task(
                task.id,
                UpdateTaskData {
                    is_recurring: Some(true),
                    recurring_days: Some(vec![Weekday::Tue, Weekday::Fri]),
                    ..Default::default()
                },
                &rewards(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(tmpl.recurring_days().map(|d| d.len()), Some(2));

        let back = store
            .edit_task(task.id, UpdateTaskData { is_recurring: Some(false), ..Default::default() }, &rewards())
            .unwrap()
            .unwrap();
        assert_eq!(back.kind, TaskKind::Standalone);
    }

    #[test]
    fn test_copy_task() {
        let mut store = TaskStore::default();
        let task = add(&mut store, "Plan week", Difficulty::Medium);
        store.complete_task(task.id, now());

        let later = now() + chrono::Duration::hours(2);
        let copy = store.copy_task(task.id, later).unwrap();
        assert_ne!(copy.id, task.id);
        assert_eq!(copy.title, "Plan week (Copy)");
        assert_eq!(copy.record, TaskRecord::Active);
        assert_eq!(copy.created_at, later);
        assert_eq!(store.tasks().len(), 2);
    }

    #[test]
    fn test_hide_and_unhide() {
        let mut store = TaskStore::default();
        let task = add(&mut store, "Meditate", Difficulty::Easy);

        assert!(store.hide_task(task.id));
        assert!(!store.hide_task(task.id));
        assert!(store.unhide_task(task.id));
        assert!(!store.unhide_task(task.id));

        store.complete_task(task.id, now());
        assert!(!store.hide_task(task.id), "completed quests are not hidden by hide_task");
    }

    #[test]
    fn test_recompute_user_with_debt() {
        let curve = LevelCurve::default();
        let mut store = TaskStore::default();
        store.push(Task {
            record: TaskRecord::Failed {
                template_id: Uuid::new_v4(),
                penalty: 20,
                missed_date: now().date_naive(),
                failed_at: now(),
            },
            ..Default::default()
        });

        let mut user = User::default();
        store.recompute_user(&mut user, &curve);
        assert_eq!(user.level, 0);
        assert_eq!(user.total_xp, 0);
        assert_eq!(user.xp_to_next_level, 20);
        assert_eq!(user.tasks_failed, 1);
        assert_eq!(user.failed_xp, 20);

        user.bonus_xp = 75;
        store.recompute_user(&mut user, &curve);
        assert_eq!(user.level, 2);
        assert_eq!(user.total_xp, 55);
        assert_eq!(user.xp, 5);
    }

    #[test]
    fn test_verify_completed_tasks_repairs_missing_timestamp() {
        let mut stored: Vec<StoredTask> = vec![
            Task { title: "ok".into(), ..Default::default() }.into(),
            Task { title: "broken".into(), ..Default::default() }.into(),
        ];
        stored[1].completed = true;

        let repaired = verify_completed_tasks(&mut stored, now());
        assert_eq!(repaired, 1);
        assert_eq!(stored[1].completed_at, Some(now()));

        let task = Task::try_from(stored[1].clone()).unwrap();
        assert!(task.is_completed());
        assert_eq!(verify_completed_tasks(&mut stored, now()), 0);
    }
}
