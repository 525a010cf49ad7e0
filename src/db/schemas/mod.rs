//! Database schemas for skilltree
//!
//! Defines MongoDB document structures for profiles and the
//! Category → Skill → SubSkill → Challenge hierarchy plus achievements.

mod achievement;
mod category;
mod challenge;
mod metadata;
mod profile;
mod skill;
mod sub_skill;

pub use achievement::{AchievementDoc, AchievementUpdate, ACHIEVEMENT_COLLECTION};
pub use category::{CategoryDoc, CategoryUpdate, CATEGORY_COLLECTION};
pub use challenge::{ChallengeDoc, ChallengeUpdate, CHALLENGE_COLLECTION, DEFAULT_XP_REWARD};
pub use metadata::Metadata;
pub use profile::{normalize_email, ProfileDoc, PROFILE_COLLECTION};
pub use skill::{SkillDoc, SkillUpdate, SKILL_COLLECTION};
pub use sub_skill::{SubSkillDoc, SubSkillUpdate, SUB_SKILL_COLLECTION};
