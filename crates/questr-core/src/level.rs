//! Level curve: the mapping between cumulative XP and level.
//!
//! Thresholds are computed once from [`CurveConfig`]: level 1 starts at 0 XP,
//! level 2 needs `base_step`, and every following step is the previous one
//! multiplied by `growth`. Lookups are binary searches over that table.

use crate::config::CurveConfig;
use crate::models::LevelThreshold;

#[derive(Debug, Clone)]
pub struct LevelCurve {
    thresholds: Vec<LevelThreshold>,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::new(&CurveConfig::default())
    }
}

impl LevelCurve {
    pub fn new(config: &CurveConfig) -> Self {
        Self {
            thresholds: build_thresholds(config),
        }
    }

    pub fn thresholds(&self) -> &[LevelThreshold] {
        &self.thresholds
    }

    pub fn max_level(&self) -> u32 {
        self.thresholds.last().map_or(1, |t| t.level)
    }

    /// XP required to reach `level`, if the level is in the table.
    pub fn threshold(&self, level: u32) -> Option<u64> {
        if level == 0 {
            return None;
        }
        self.thresholds
            .get(level as usize - 1)
            .map(|t| t.xp_required)
    }

    /// Greatest level whose requirement is at most `total_xp`.
    pub fn level_for(&self, total_xp: u64) -> u32 {
        let idx = self
            .thresholds
            .partition_point(|t| t.xp_required <= total_xp);
        // Level 1 requires 0 XP, so at least one threshold always matches.
        self.thresholds[idx.max(1) - 1].level
    }

    /// XP still missing to reach the next level, 0 at the top of the table.
    pub fn xp_to_next_level(&self, total_xp: u64) -> u64 {
        let level = self.level_for(total_xp);
        self.threshold(level + 1)
            .map_or(0, |next| next.saturating_sub(total_xp))
    }

    /// XP earned since the current level was reached.
    pub fn xp_within_level(&self, total_xp: u64) -> u64 {
        let level = self.level_for(total_xp);
        total_xp - self.threshold(level).unwrap_or(0)
    }

    /// Total width of the current level, 0 at the top of the table.
    pub fn xp_span_of_level(&self, total_xp: u64) -> u64 {
        let level = self.level_for(total_xp);
        match (self.threshold(level), self.threshold(level + 1)) {
            (Some(current), Some(next)) => next - current,
            _ => 0,
        }
    }
}

/// Builds the ordered `{level, xp_required}` table.
///
/// Both columns are strictly increasing; each step is rounded and never
/// smaller than one XP.
pub fn build_thresholds(config: &CurveConfig) -> Vec<LevelThreshold> {
    let max_level = config.max_level.max(1);
    let mut thresholds = Vec::with_capacity(max_level as usize);
    thresholds.push(LevelThreshold { level: 1, xp_required: 0 });

    let mut step = config.base_step;
    let mut required: u64 = 0;
    for level in 2..=max_level {
        let increment = (step.round() as u64).max(1);
        required = required.saturating_add(increment);
        thresholds.push(LevelThreshold { level, xp_required: required });
        step *= config.growth;
    }

    thresholds
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_table_shape() {
        let curve = LevelCurve::default();
        let thresholds = curve.thresholds();

        assert_eq!(thresholds.len(), 100);
        assert_eq!(thresholds[0], LevelThreshold { level: 1, xp_required: 0 });
        assert_eq!(thresholds[1].xp_required, 50);
        assert_eq!(thresholds[2].xp_required, 110);
        assert_eq!(thresholds[3].xp_required, 182);
        assert!(thresholds.windows(2).all(|w| {
            w[0].level < w[1].level && w[0].xp_required < w[1].xp_required
        }));
    }

    #[rstest]
    #[case(0, 1)]
    #[case(49, 1)]
    #[case(50, 2)]
    #[case(55, 2)]
    #[case(109, 2)]
    #[case(110, 3)]
    #[case(u64::MAX, 100)]
    fn test_level_for(#[case] total_xp: u64, #[case] expected: u32) {
        assert_eq!(LevelCurve::default().level_for(total_xp), expected);
    }

    #[test]
    fn test_progress_within_level() {
        let curve = LevelCurve::default();
        assert_eq!(curve.xp_to_next_level(55), 55);
        assert_eq!(curve.xp_within_level(55), 5);
        assert_eq!(curve.xp_span_of_level(55), 60);
        assert_eq!(curve.xp_to_next_level(0), 50);
    }

    #[test]
    fn test_max_level_has_no_next() {
        let curve = LevelCurve::default();
        let top = curve.threshold(100).unwrap();
        assert_eq!(curve.level_for(top), 100);
        assert_eq!(curve.xp_to_next_level(top + 1_000), 0);
        assert_eq!(curve.xp_span_of_level(top), 0);
        assert_eq!(curve.xp_within_level(top + 7), 7);
    }

    #[test]
    fn test_small_custom_curve() {
        let curve = LevelCurve::new(&CurveConfig { base_step: 10.0, growth: 2.0, max_level: 4 });
        let required: Vec<u64> = curve.thresholds().iter().map(|t| t.xp_required).collect();
        assert_eq!(required, vec![0, 10, 30, 70]);
        assert_eq!(curve.max_level(), 4);
        assert_eq!(curve.threshold(0), None);
        assert_eq!(curve.threshold(5), None);
    }

    proptest! {
        #[test]
        fn prop_level_is_monotonic(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let curve = LevelCurve::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(curve.level_for(lo) <= curve.level_for(hi));
        }

        #[test]
        fn prop_level_brackets_total(total in 0u64..10_000_000) {
            let curve = LevelCurve::default();
            let level = curve.level_for(total);
            prop_assert!(curve.threshold(level).unwrap() <= total);
            if let Some(next) = curve.threshold(level + 1) {
                prop_assert!(total < next);
                prop_assert_eq!(curve.xp_within_level(total) + curve.xp_to_next_level(total), curve.xp_span_of_level(total));
            }
        }
    }
}
