//! Consecutive-day streaks and the milestone bonuses they pay out.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::models::User;
use crate::timezone::days_between;

/// A streak length that grants a bonus whenever the streak climbs past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub days: u32,
    pub xp_reward: u32,
    pub name: String,
}

impl Milestone {
    pub fn new(days: u32, xp_reward: u32, name: &str) -> Self {
        Self { days, xp_reward, name: name.to_string() }
    }

    pub fn default_table() -> Vec<Milestone> {
        vec![
            Milestone::new(3, 15, "Kindling"),
            Milestone::new(7, 50, "Week Warrior"),
            Milestone::new(14, 100, "Fortnight Focus"),
            Milestone::new(30, 250, "Monthly Master"),
            Milestone::new(60, 500, "Relentless"),
            Milestone::new(100, 1000, "Centurion"),
            Milestone::new(365, 5000, "Year of Quests"),
        ]
    }
}

/// Result of a streak change that awarded something or moved the counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakUpdate {
    pub previous_streak: u32,
    pub streak_days: u32,
    /// Milestones crossed by this update, in table order
    pub milestones: Vec<Milestone>,
    /// Sum of the crossed milestones' rewards, already added to `bonus_xp`
    pub bonus_xp: u64,
}

#[derive(Debug, Clone)]
pub struct StreakTracker {
    milestones: Vec<Milestone>,
}

impl StreakTracker {
    pub fn new(milestones: Vec<Milestone>) -> Self {
        Self { milestones }
    }

    /// Applies a day rollover to `user`.
    ///
    /// Returns `None` when `today` is not after `last_active` (same day, or a
    /// clock that went backwards) and on the very first run, which only
    /// records the date.
    ///
    /// A gap of exactly one day extends the streak; any longer gap resets it
    /// to 0. A completion on the new day is what restarts it at 1, see
    /// [`StreakTracker::mark_active`].
    pub fn roll_over(&self, user: &mut User, today: NaiveDate) -> Option<StreakUpdate> {
        let Some(last_active) = user.last_active else {
            user.last_active = Some(today);
            return None;
        };

        let gap = days_between(last_active, today);
        if gap <= 0 {
            return None;
        }

        let previous_streak = user.streak_days;
        user.streak_days = if gap == 1 { previous_streak + 1 } else { 0 };
        user.last_active = Some(today);

        if gap > 1 {
            info!(gap, previous_streak, "Streak broken");
        } else {
            debug!(streak = user.streak_days, "Streak extended");
        }

        Some(self.award(user, previous_streak))
    }

    /// Records activity on `today`: keeps `last_active` fresh and starts a
    /// streak at 1 when none is running.
    pub fn mark_active(&self, user: &mut User, today: NaiveDate) -> Option<StreakUpdate> {
        if user.last_active.map_or(true, |last| last < today) {
            user.last_active = Some(today);
        }
        if user.streak_days > 0 {
            return None;
        }

        user.streak_days = 1;
        Some(self.award(user, 0))
    }

    fn award(&self, user: &mut User, previous_streak: u32) -> StreakUpdate {
        let milestones: Vec<Milestone> = self
            .milestones
            .iter()
            .filter(|m| previous_streak < m.days && m.days <= user.streak_days)
            .cloned()
            .collect();

        let bonus_xp: u64 = milestones.iter().map(|m| u64::from(m.xp_reward)).sum();
        user.bonus_xp += bonus_xp;

        for milestone in &milestones {
            info!(days = milestone.days, reward = milestone.xp_reward, name = %milestone.name, "Streak milestone reached");
        }

        StreakUpdate {
            previous_streak,
            streak_days: user.streak_days,
            milestones,
            bonus_xp,
        }
    }
}

impl Default for StreakTracker {
    fn default() -> Self {
        Self::new(Milestone::default_table())
    }
}
