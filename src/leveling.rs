//! XP ledger and level calculation
//!
//! Levels are always derived from accumulated XP, never stored on their own:
//! `level = max(1, floor(xp / xp_per_level) + 1)`. Each XP pool type levels at
//! its own rate; categories level half as fast as skills.

use serde::Serialize;

use crate::types::{Result, SkillTreeError};

/// XP per level for skills
pub const SKILL_XP_PER_LEVEL: i64 = 100;

/// XP per level for categories
pub const CATEGORY_XP_PER_LEVEL: i64 = 200;

/// XP per level for a profile's aggregate total
pub const PROFILE_XP_PER_LEVEL: i64 = 100;

/// Largest XP a single award may carry
pub const MAX_XP_REWARD: i64 = 1_000_000;

/// Compute the level for an amount of XP.
///
/// Defined for every input: negative xp counts as zero and a non-positive
/// divisor as one, so the result is always at least 1.
pub fn level_for(xp: i64, xp_per_level: i64) -> i64 {
    let xp = xp.max(0);
    let per_level = xp_per_level.max(1);
    (xp / per_level + 1).max(1)
}

/// Kind of entity that accumulates XP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum XpPool {
    Skill,
    Category,
    Profile,
}

impl XpPool {
    pub fn xp_per_level(self) -> i64 {
        match self {
            Self::Skill => SKILL_XP_PER_LEVEL,
            Self::Category => CATEGORY_XP_PER_LEVEL,
            Self::Profile => PROFILE_XP_PER_LEVEL,
        }
    }

    /// Level for `xp` in this pool
    pub fn level(self, xp: i64) -> i64 {
        level_for(xp, self.xp_per_level())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Category => "category",
            Self::Profile => "profile",
        }
    }
}

/// Position inside the current level, for progress bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: i64,
    /// XP earned since the current level began
    pub xp_into_level: i64,
    /// XP still needed to reach the next level
    pub xp_to_next_level: i64,
    pub xp_per_level: i64,
}

impl LevelProgress {
    pub fn new(pool: XpPool, xp: i64) -> Self {
        let xp = xp.max(0);
        let per_level = pool.xp_per_level();
        let xp_into_level = xp % per_level;
        Self {
            level: pool.level(xp),
            xp_into_level,
            xp_to_next_level: per_level - xp_into_level,
            xp_per_level: per_level,
        }
    }
}

/// Outcome of one XP award on one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpChange {
    pub pool: XpPool,
    pub xp_before: i64,
    pub xp_after: i64,
    pub level_before: i64,
    pub level_after: i64,
}

impl XpChange {
    /// Build the change produced by adding `amount` to a pool holding
    /// `xp_before`. Fails instead of wrapping when the total leaves `i64`.
    pub fn apply(pool: XpPool, xp_before: i64, amount: i64) -> Result<Self> {
        let xp_after = add_xp(xp_before, amount)?;
        Ok(Self {
            pool,
            xp_before,
            xp_after,
            level_before: pool.level(xp_before),
            level_after: pool.level(xp_after),
        })
    }

    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

/// Overflow-checked XP addition
pub fn add_xp(xp: i64, amount: i64) -> Result<i64> {
    xp.checked_add(amount).ok_or_else(|| {
        SkillTreeError::Validation(format!("XP total would overflow ({} + {})", xp, amount))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels() {
        assert_eq!(level_for(0, 100), 1);
        assert_eq!(level_for(99, 100), 1);
        assert_eq!(level_for(100, 100), 2);
        assert_eq!(level_for(250, 200), 2);
        assert_eq!(level_for(400, 200), 3);
    }

    #[test]
    fn test_monotonic_and_at_least_one() {
        for per_level in [1, 7, 100, 200] {
            let mut previous = level_for(0, per_level);
            assert!(previous >= 1);
            for xp in 1..2_000 {
                let level = level_for(xp, per_level);
                assert!(level >= previous, "level dropped at xp={xp}, per={per_level}");
                assert!(level >= 1);
                previous = level;
            }
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(level_for(-50, 100), 1);
        assert_eq!(level_for(5, 0), 6);
    }

    #[test]
    fn test_pool_policy() {
        assert_eq!(XpPool::Skill.level(100), 2);
        assert_eq!(XpPool::Category.level(100), 1);
        assert_eq!(XpPool::Category.level(200), 2);
        assert_eq!(XpPool::Profile.level(100), 2);
    }

    #[test]
    fn test_progress() {
        let progress = LevelProgress::new(XpPool::Category, 250);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.xp_into_level, 50);
        assert_eq!(progress.xp_to_next_level, 150);
    }

    #[test]
    fn test_xp_change_detects_level_up() {
        let change = XpChange::apply(XpPool::Skill, 75, 25).unwrap();
        assert_eq!(change.xp_after, 100);
        assert_eq!(change.level_after, 2);
        assert!(change.leveled_up());

        let change = XpChange::apply(XpPool::Category, 75, 25).unwrap();
        assert_eq!(change.level_after, 1);
        assert!(!change.leveled_up());
    }

    #[test]
    fn test_xp_change_refuses_to_wrap() {
        let err = XpChange::apply(XpPool::Skill, i64::MAX - 5, 10).unwrap_err();
        assert!(matches!(err, SkillTreeError::Validation(_)));

        let change = XpChange::apply(XpPool::Skill, i64::MAX - 10, 10).unwrap();
        assert_eq!(change.xp_after, i64::MAX);
        assert!(change.level_after >= change.level_before);
    }
}
