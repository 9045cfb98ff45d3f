use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

/// Title prefix that marks a failure record in display text and in legacy data.
pub const FAILED_PREFIX: &str = "FAILED:";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid difficulty: {0}")]
pub struct ParseDifficultyError(String);

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ParseDifficultyError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// Visibility of a quest in default views. Independent of completion: a
/// completed quest can still be hidden.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    #[default]
    Active,
    Hidden,
    Completed,
}

/// What a task is in the recurrence model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// A one-off quest
    Standalone,
    /// A recurring definition; never completed directly
    Template { recurring_days: WeekdaySet },
    /// A concrete occurrence of a template for one local calendar day
    Instance {
        parent_task_id: Uuid,
        occurrence_date: NaiveDate,
    },
}

/// Where a task stands in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRecord {
    Active,
    Completed {
        completed_at: DateTime<Utc>,
    },
    /// Synthetic entry for a missed template occurrence
    Failed {
        template_id: Uuid,
        penalty: u32,
        missed_date: NaiveDate,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredTask", into = "StoredTask")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// Reward captured at creation/edit time so later table changes never
    /// rewrite past XP.
    pub xp_reward: u32,
    pub kind: TaskKind,
    pub record: TaskRecord,
    pub created_at: DateTime<Utc>,
    pub quest_type: Option<String>,
    pub quest_status: QuestStatus,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            description: String::new(),
            difficulty: Difficulty::Easy,
            xp_reward: 0,
            kind: TaskKind::Standalone,
            record: TaskRecord::Active,
            created_at: Utc::now(),
            quest_type: None,
            quest_status: QuestStatus::Active,
        }
    }
}

impl Task {
    pub fn is_template(&self) -> bool {
        matches!(self.kind, TaskKind::Template { .. })
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.kind, TaskKind::Instance { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.record, TaskRecord::Failed { .. })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.record, TaskRecord::Completed { .. })
    }

    pub fn is_hidden(&self) -> bool {
        self.quest_status == QuestStatus::Hidden
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self.record {
            TaskRecord::Completed { completed_at } => Some(completed_at),
            _ => None,
        }
    }

    /// Template this task belongs to, for instances and failure records.
    pub fn parent_task_id(&self) -> Option<Uuid> {
        match (&self.kind, &self.record) {
            (_, TaskRecord::Failed { template_id, .. }) => Some(*template_id),
            (TaskKind::Instance { parent_task_id, .. }, _) => Some(*parent_task_id),
            _ => None,
        }
    }

    pub fn occurrence_date(&self) -> Option<NaiveDate> {
        match self.kind {
            TaskKind::Instance { occurrence_date, .. } => Some(occurrence_date),
            _ => None,
        }
    }

    pub fn recurring_days(&self) -> Option<&WeekdaySet> {
        match &self.kind {
            TaskKind::Template { recurring_days } => Some(recurring_days),
            _ => None,
        }
    }

    /// Penalty carried by a failure record, zero for everything else.
    pub fn penalty(&self) -> u32 {
        match self.record {
            TaskRecord::Failed { penalty, .. } => penalty,
            _ => 0,
        }
    }

    pub fn display_title(&self) -> String {
        if self.is_failure() {
            format!("{} {}", FAILED_PREFIX, self.title)
        } else {
            self.title.clone()
        }
    }
}

/// Set of weekdays a template recurs on, iterated Monday first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        let mut day = Weekday::Mon;
        (0..7).filter_map(move |_| {
            let current = day;
            day = day.succ();
            self.contains(current).then_some(current)
        })
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::default();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

/// Lowercase full weekday name used on the wire ("monday", ...).
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFailure {
    pub template_id: Uuid,
    pub penalty: u32,
    pub missed_date: NaiveDate,
}

/// Persisted shape of a task.
///
/// Mirrors the flat record the key-value store has always held. Data read
/// from outside may violate the task invariants, so the store repairs a
/// `Vec<StoredTask>` before converting it into [`Task`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTask {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub xp_reward: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_days: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest_type: Option<String>,
    #[serde(default)]
    pub quest_status: QuestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StoredFailure>,
}

impl From<Task> for StoredTask {
    fn from(task: Task) -> Self {
        let (is_recurring, recurring_days, parent_task_id, occurrence_date) = match &task.kind {
            TaskKind::Standalone => (false, None, None, None),
            TaskKind::Template { recurring_days } => (
                true,
                Some(recurring_days.iter().map(|d| weekday_name(d).to_string()).collect()),
                None,
                None,
            ),
            TaskKind::Instance { parent_task_id, occurrence_date } => {
                (false, None, Some(*parent_task_id), Some(*occurrence_date))
            }
        };

        let (completed, completed_at, failure, parent_task_id) = match task.record {
            TaskRecord::Active => (false, None, None, parent_task_id),
            TaskRecord::Completed { completed_at } => (true, Some(completed_at), None, parent_task_id),
            // A failure record keeps a completion-like timestamp for history
            // views even though it is not completed.
            TaskRecord::Failed { template_id, penalty, missed_date, failed_at } => (
                false,
                Some(failed_at),
                Some(StoredFailure { template_id, penalty, missed_date }),
                Some(template_id),
            ),
        };

        StoredTask {
            id: task.id,
            title: task.title,
            description: task.description,
            difficulty: task.difficulty,
            xp_reward: task.xp_reward,
            completed,
            completed_at,
            created_at: task.created_at,
            is_recurring,
            recurring_days,
            parent_task_id,
            occurrence_date,
            quest_type: task.quest_type,
            quest_status: task.quest_status,
            failure,
        }
    }
}

impl TryFrom<StoredTask> for Task {
    type Error = CoreError;

    fn try_from(stored: StoredTask) -> Result<Self, Self::Error> {
        let record = match (&stored.failure, stored.completed, stored.completed_at) {
            (Some(failure), _, at) => TaskRecord::Failed {
                template_id: failure.template_id,
                penalty: failure.penalty,
                missed_date: failure.missed_date,
                failed_at: at.unwrap_or(stored.created_at),
            },
            (None, true, Some(completed_at)) => TaskRecord::Completed { completed_at },
            (None, true, None) => {
                return Err(CoreError::InvalidInput(format!(
                    "Task {} is completed but has no completion time",
                    stored.id
                )))
            }
            // An active task never carries a completion time.
            (None, false, _) => TaskRecord::Active,
        };

        let kind = if stored.failure.is_some() {
            TaskKind::Standalone
        } else if stored.is_recurring {
            let recurring_days = stored
                .recurring_days
                .unwrap_or_default()
                .iter()
                .map(|d| {
                    d.parse::<Weekday>()
                        .map_err(|_| CoreError::InvalidInput(format!("Invalid weekday: {}", d)))
                })
                .collect::<Result<WeekdaySet, _>>()?;
            TaskKind::Template { recurring_days }
        } else if let Some(parent_task_id) = stored.parent_task_id {
            TaskKind::Instance {
                parent_task_id,
                occurrence_date: stored
                    .occurrence_date
                    .unwrap_or_else(|| stored.created_at.date_naive()),
            }
        } else {
            TaskKind::Standalone
        };

        let quest_status = match (&record, stored.quest_status) {
            (_, QuestStatus::Hidden) => QuestStatus::Hidden,
            (TaskRecord::Completed { .. }, _) => QuestStatus::Completed,
            (_, _) => QuestStatus::Active,
        };

        Ok(Task {
            id: stored.id,
            title: stored.title,
            description: stored.description,
            difficulty: stored.difficulty,
            xp_reward: stored.xp_reward,
            kind,
            record,
            created_at: stored.created_at,
            quest_type: stored.quest_type,
            quest_status,
        })
    }
}

/// The single progression aggregate.
///
/// `level`, `xp` and `xp_to_next_level` are always derived from the task
/// collection and `bonus_xp`; never mutate them without a recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub level: u32,
    /// XP earned within the current level
    pub xp: u64,
    /// Lifetime XP net of failures, floored at zero
    pub total_xp: u64,
    pub xp_to_next_level: u64,
    pub tasks_completed: u32,
    pub tasks_failed: u32,
    pub failed_xp: u64,
    /// Milestone bonuses awarded so far
    pub bonus_xp: u64,
    pub streak_days: u32,
    pub last_active: Option<NaiveDate>,
    pub last_recurring_check: Option<NaiveDate>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            total_xp: 0,
            xp_to_next_level: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            failed_xp: 0,
            bonus_xp: 0,
            streak_days: 0,
            last_active: None,
            last_recurring_check: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub tasks_completed: u32,
    /// Net XP for the day; failures make this negative
    pub xp_gained: i64,
}

impl DailyStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self { date, tasks_completed: 0, xp_gained: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTask {
    pub id: Uuid,
    pub title: String,
    pub xp_reward: u32,
    pub completed_at: DateTime<Utc>,
}

/// Tasks completed on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHistoryEntry {
    pub date: NaiveDate,
    pub tasks: Vec<HistoryTask>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelThreshold {
    pub level: u32,
    pub xp_required: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUp {
    pub old_level: u32,
    pub new_level: u32,
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// When true a template is created and `recurring_days` must be non-empty
    pub is_recurring: bool,
    pub recurring_days: Vec<Weekday>,
    pub quest_type: Option<String>,
}

/// Fields for `edit_task`; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub is_recurring: Option<bool>,
    pub recurring_days: Option<Vec<Weekday>>,
    pub quest_type: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, h, 0, 0).unwrap()
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("legendary".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Medium.to_string(), "medium");
    }

    #[test]
    fn test_template_wire_format() {
        let task = Task {
            title: "Drink Water".to_string(),
            kind: TaskKind::Template {
                recurring_days: [Weekday::Mon, Weekday::Thu].into_iter().collect(),
            },
            created_at: at(8),
            ..Default::default()
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["isRecurring"], true);
        assert_eq!(json["recurringDays"], serde_json::json!(["monday", "thursday"]));
        assert_eq!(json["completed"], false);
        assert!(json.get("completedAt").is_none());
        assert!(json.get("parentTaskId").is_none());

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_failure_record_wire_format() {
        let template_id = Uuid::new_v4();
        let task = Task {
            title: "Stretch".to_string(),
            record: TaskRecord::Failed {
                template_id,
                penalty: 20,
                missed_date: NaiveDate::from_ymd_opt(2024, 5, 5).unwrap(),
                failed_at: at(9),
            },
            ..Default::default()
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["completed"], false);
        assert_eq!(json["parentTaskId"], serde_json::json!(template_id));
        assert!(json.get("completedAt").is_some());
        assert_eq!(json["failure"]["penalty"], 20);

        let back: Task = serde_json::from_value(json).unwrap();
        assert!(back.is_failure());
        assert_eq!(back.parent_task_id(), Some(template_id));
        assert_eq!(back.display_title(), "FAILED: Stretch");
    }

    #[test]
    fn test_completed_without_timestamp_is_rejected() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Broken",
            "completed": true,
            "createdAt": at(8),
        });
        assert!(serde_json::from_value::<Task>(json).is_err());
    }

    #[test]
    fn test_active_task_drops_stray_completion_time() {
        let stored = StoredTask {
            id: Uuid::new_v4(),
            title: "Stray".to_string(),
            description: String::new(),
            difficulty: Difficulty::Easy,
            xp_reward: 10,
            completed: false,
            completed_at: Some(at(10)),
            created_at: at(8),
            is_recurring: false,
            recurring_days: None,
            parent_task_id: None,
            occurrence_date: None,
            quest_type: None,
            quest_status: QuestStatus::Completed,
            failure: None,
        };

        let task = Task::try_from(stored).unwrap();
        assert_eq!(task.record, TaskRecord::Active);
        assert_eq!(task.completed_at(), None);
        assert_eq!(task.quest_status, QuestStatus::Active);
    }

    #[test]
    fn test_weekday_set_iterates_monday_first() {
        let days: WeekdaySet = [Weekday::Sun, Weekday::Wed, Weekday::Mon, Weekday::Wed]
            .into_iter()
            .collect();
        assert_eq!(days.len(), 3);
        assert!(days.contains(Weekday::Wed));
        assert!(!days.contains(Weekday::Tue));
        assert_eq!(days.iter().collect::<Vec<_>>(), vec![Weekday::Mon, Weekday::Wed, Weekday::Sun]);
        assert!(WeekdaySet::default().is_empty());
    }

    #[test]
    fn test_user_defaults() {
        let user: User = serde_json::from_str("{}").unwrap();
        assert_eq!(user.level, 1);
        assert_eq!(user.total_xp, 0);
        assert_eq!(user.streak_days, 0);
    }
}
