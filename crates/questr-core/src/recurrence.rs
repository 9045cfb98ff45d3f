//! Recurring quest generation and missed-occurrence detection.
//!
//! A template recurs on a set of weekdays. For each local calendar day it is
//! scheduled on, exactly one instance should exist. Two idempotency markers
//! keep repeated invocations (re-renders, reloads) from generating twice or
//! penalizing twice on the same day; see [`CheckState`].

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{QuestStatus, Task, TaskKind, TaskRecord};
use crate::timezone::{local_date, previous_day};

/// Dates on which generation and failure detection last ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckState {
    pub last_recurring_check: Option<NaiveDate>,
    pub last_failure_check: Option<NaiveDate>,
}

/// A template that went unmet on `missed_date`.
#[derive(Debug, Clone, PartialEq)]
pub struct MissedOccurrence {
    pub template: Task,
    pub missed_date: NaiveDate,
}

/// RecurrenceEngine: Derives instance and failure decisions for a calendar day.
///
/// Responsibilities:
/// 1. Select templates scheduled on a given weekday
/// 2. Create the missing instance for each scheduled template
/// 3. Detect templates left unmet on the previous day
/// 4. Collapse duplicate instances of one (template, day) pair
///
/// It never mutates the collection itself; the engine applies its decisions.
#[derive(Debug, Clone)]
pub struct RecurrenceEngine {
    timezone: Tz,
}

impl RecurrenceEngine {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        local_date(instant, &self.timezone)
    }

    /// Templates whose schedule includes the weekday of `day`.
    pub fn scheduled_templates<'a>(&self, tasks: &'a [Task], day: NaiveDate) -> Vec<&'a Task> {
        let weekday = day.weekday();
        tasks
            .iter()
            .filter(|t| t.recurring_days().map_or(false, |days| days.contains(weekday)))
            .collect()
    }

    /// Non-failure instances of `template_id` that belong to `day`: targeted
    /// at it, or completed on it.
    pub fn instances_for_day<'a>(&self, tasks: &'a [Task], template_id: Uuid, day: NaiveDate) -> Vec<&'a Task> {
        tasks
            .iter()
            .filter(|t| match t.kind {
                TaskKind::Instance { parent_task_id, occurrence_date } => {
                    parent_task_id == template_id
                        && !t.is_failure()
                        && (occurrence_date == day
                            || t.completed_at().map_or(false, |at| self.day_of(at) == day))
                }
                _ => false,
            })
            .collect()
    }

    /// Builds a fresh instance of `template` for `day`.
    pub fn instantiate(&self, template: &Task, day: NaiveDate, now: DateTime<Utc>) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: template.title.clone(),
            description: template.description.clone(),
            difficulty: template.difficulty,
            xp_reward: template.xp_reward,
            kind: TaskKind::Instance {
                parent_task_id: template.id,
                occurrence_date: day,
            },
            record: TaskRecord::Active,
            created_at: now,
            quest_type: template.quest_type.clone(),
            quest_status: QuestStatus::Active,
        }
    }

    /// Instance for `template` on `day` if it is scheduled then and has none.
    pub fn instance_if_missing(&self, tasks: &[Task], template: &Task, day: NaiveDate, now: DateTime<Utc>) -> Option<Task> {
        let scheduled = template
            .recurring_days()
            .map_or(false, |days| days.contains(day.weekday()));
        if !scheduled || !self.instances_for_day(tasks, template.id, day).is_empty() {
            return None;
        }
        Some(self.instantiate(template, day, now))
    }

    /// Creates today's missing instances.
    ///
    /// Returns `None` when generation already ran today. Otherwise returns the
    /// new instances (possibly none) and records `today` in `checks`; the
    /// caller persists them in a single batch.
    pub fn generate_for_today(
        &self,
        tasks: &[Task],
        checks: &mut CheckState,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Option<Vec<Task>> {
        if checks.last_recurring_check == Some(today) {
            debug!(%today, "Recurring generation already ran today");
            return None;
        }

        let scheduled = self.scheduled_templates(tasks, today);
        let created: Vec<Task> = scheduled
            .iter()
            .filter_map(|template| self.instance_if_missing(tasks, template, today, now))
            .collect();

        info!(
            %today,
            scheduled = scheduled.len(),
            created = created.len(),
            "Generated recurring instances"
        );

        checks.last_recurring_check = Some(today);
        Some(created)
    }

    /// Finds templates scheduled yesterday that were never completed.
    ///
    /// A template is skipped when it already has a failure record for
    /// yesterday or today, when one of its instances was completed yesterday
    /// or today (late completions after midnight count), or when it was
    /// created after yesterday.
    ///
    /// Returns `None` when detection already ran today; otherwise marks
    /// `today` in `checks` regardless of the outcome.
    pub fn find_missed(&self, tasks: &[Task], checks: &mut CheckState, today: NaiveDate) -> Option<Vec<MissedOccurrence>> {
        if checks.last_failure_check == Some(today) {
            debug!(%today, "Failure check already ran today");
            return None;
        }

        let yesterday = previous_day(today);
        let missed = self
            .scheduled_templates(tasks, yesterday)
            .into_iter()
            .filter(|template| self.day_of(template.created_at) <= yesterday)
            .filter(|template| !self.has_failure_record(tasks, template.id, yesterday, today))
            .filter(|template| !self.was_completed(tasks, template.id, yesterday, today))
            .map(|template| MissedOccurrence {
                template: template.clone(),
                missed_date: yesterday,
            })
            .collect();

        checks.last_failure_check = Some(today);
        Some(missed)
    }

    fn has_failure_record(&self, tasks: &[Task], template_id: Uuid, yesterday: NaiveDate, today: NaiveDate) -> bool {
        tasks.iter().any(|t| match t.record {
            TaskRecord::Failed { template_id: id, missed_date, failed_at, .. } => {
                id == template_id
                    && (missed_date == yesterday || missed_date == today || self.day_of(failed_at) == today)
            }
            _ => false,
        })
    }

    fn was_completed(&self, tasks: &[Task], template_id: Uuid, yesterday: NaiveDate, today: NaiveDate) -> bool {
        tasks.iter().any(|t| {
            let TaskKind::Instance { parent_task_id, occurrence_date } = t.kind else {
                return false;
            };
            let Some(completed_at) = t.completed_at() else {
                return false;
            };
            let completed_on = self.day_of(completed_at);
            parent_task_id == template_id
                && (occurrence_date == yesterday || completed_on == yesterday || completed_on == today)
        })
    }

    /// Ids of instances shadowed by a more recently created instance of the
    /// same (template, day) pair.
    pub fn duplicate_instance_ids(&self, tasks: &[Task]) -> Vec<Uuid> {
        let mut newest: HashMap<(Uuid, NaiveDate), &Task> = HashMap::new();
        let mut shadowed = Vec::new();

        for task in tasks.iter().filter(|t| !t.is_failure()) {
            let TaskKind::Instance { parent_task_id, occurrence_date } = task.kind else {
                continue;
            };
            match newest.get_mut(&(parent_task_id, occurrence_date)) {
                Some(kept) if kept.created_at > task.created_at => shadowed.push(task.id),
                Some(kept) => {
                    shadowed.push(kept.id);
                    *kept = task;
                }
                None => {
                    newest.insert((parent_task_id, occurrence_date), task);
                }
            }
        }

        shadowed
    }

    /// `tasks` without shadowed duplicate instances, order preserved.
    pub fn dedupe_instances<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        let shadowed = self.duplicate_instance_ids(tasks);
        tasks.iter().filter(|t| !shadowed.contains(&t.id)).collect()
    }
}
