//! Services layer for skilltree
//!
//! Business logic between the HTTP routes and the store.
//!
//! ## Services
//!
//! - **Catalog**: CRUD for categories, skills, sub-skills and challenges
//! - **AchievementCascade**: records completions and awards XP
//! - **HierarchyAssembler**: nested trees and profile totals
//! - **ProfileService**: registration, login and the current profile

pub mod achievements;
pub mod catalog;
pub mod hierarchy;
pub mod profiles;

pub use achievements::{
    AchievementCascade, ChallengeLineage, CompletedAchievement, CompletedAchievementView,
};
pub use catalog::Catalog;
pub use hierarchy::{CategoryTree, HierarchyAssembler, ProfileStats, SkillTree, SubSkillTree};
pub use profiles::{ProfileService, Session};
