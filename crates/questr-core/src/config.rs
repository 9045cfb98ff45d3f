//! Policy constants for the quest engine.
//!
//! Everything here is a product decision rather than something derived from
//! data: how much a quest is worth, how hard a missed recurring quest hurts,
//! how steep the level curve is and which streak lengths pay out a bonus.

use crate::error::CoreError;
use crate::models::Difficulty;
use crate::streak::Milestone;
use crate::timezone::validate_timezone;

/// XP amounts keyed by difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyTable {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl DifficultyTable {
    pub fn get(&self, difficulty: Difficulty) -> u32 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    /// XP granted for completing a quest.
    pub fn default_rewards() -> Self {
        Self { easy: 10, medium: 25, hard: 50 }
    }

    /// XP lost when a recurring quest is missed.
    pub fn default_penalties() -> Self {
        Self { easy: 5, medium: 10, hard: 20 }
    }
}

/// Shape of the progressive level curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveConfig {
    /// XP needed to go from level 1 to level 2
    pub base_step: f64,
    /// Multiplier applied to the step for every following level
    pub growth: f64,
    /// Highest level in the table
    pub max_level: u32,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            base_step: 50.0,
            growth: 1.2,
            max_level: 100,
        }
    }
}

/// Configuration for the quest engine - core version
/// This is separate from the CLI config so the core has no file/env knowledge
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// IANA timezone that defines the player's calendar day
    pub timezone: String,
    pub rewards: DifficultyTable,
    pub penalties: DifficultyTable,
    pub curve: CurveConfig,
    /// Streak milestones, strictly increasing in `days`
    pub milestones: Vec<Milestone>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            rewards: DifficultyTable::default_rewards(),
            penalties: DifficultyTable::default_penalties(),
            curve: CurveConfig::default(),
            milestones: Milestone::default_table(),
        }
    }
}

impl EngineConfig {
    pub fn with_timezone(timezone: impl Into<String>) -> Self {
        Self {
            timezone: timezone.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_timezone(&self.timezone)?;

        if self.curve.max_level < 2 {
            return Err(CoreError::InvalidInput(
                "Level curve needs at least two levels".to_string(),
            ));
        }
        if self.curve.base_step < 1.0 || self.curve.growth < 1.0 {
            return Err(CoreError::InvalidInput(
                "Level curve must be strictly increasing".to_string(),
            ));
        }
        if self.milestones.windows(2).any(|w| w[0].days >= w[1].days) {
            return Err(CoreError::InvalidInput(
                "Milestones must be strictly increasing in days".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let config = EngineConfig::with_timezone("Mars/Olympus_Mons");
        assert!(matches!(config.validate(), Err(CoreError::InvalidTimezone(_))));
    }

    #[test]
    fn test_unordered_milestones_rejected() {
        let mut config = EngineConfig::default();
        config.milestones.swap(0, 1);
        assert!(matches!(config.validate(), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_penalties_harsher_at_hard() {
        let penalties = DifficultyTable::default_penalties();
        assert!(penalties.get(Difficulty::Hard) > penalties.get(Difficulty::Medium));
        assert_eq!(penalties.get(Difficulty::Hard), 20);
        assert_eq!(DifficultyTable::default_rewards().get(Difficulty::Easy), 10);
    }
}
