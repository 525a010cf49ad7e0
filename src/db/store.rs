//! Storage contract for the skill tree
//!
//! Both backends (in-memory and MongoDB) implement `SkillStore`. XP changes
//! go through `award_xp` or `record_achievement` only, which increment xp and
//! rederive level as one atomic write.

use async_trait::async_trait;
use bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;

use crate::db::connection::MongoConnection;
use crate::db::entity::{Entity, ListFilter, Patch};
use crate::db::memory::MemoryStore;
use crate::db::mongo_store::MongoStore;
use crate::db::schemas::{AchievementDoc, ProfileDoc};
use crate::leveling::{XpChange, XpPool, MAX_XP_REWARD};
use crate::types::{Result, SkillTreeError};

/// Root of a cascading delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRoot {
    Category(ObjectId),
    Skill(ObjectId),
    SubSkill(ObjectId),
    Challenge(ObjectId),
    Achievement(ObjectId),
}

/// Number of documents removed by a delete, per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub categories: u64,
    pub skills: u64,
    pub sub_skills: u64,
    pub challenges: u64,
    pub achievements: u64,
}

impl DeleteSummary {
    pub fn total(&self) -> u64 {
        self.categories + self.skills + self.sub_skills + self.challenges + self.achievements
    }
}

/// The completed challenge's lineage. The store re-checks the challenge and
/// sub-skill links while it holds its lock or transaction, then credits the
/// skill and the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardTarget {
    pub challenge_id: ObjectId,
    pub sub_skill_id: ObjectId,
    pub skill_id: ObjectId,
    pub category_id: ObjectId,
}

/// An achievement together with the XP changes committed alongside it
#[derive(Debug, Clone)]
pub struct RecordedAchievement {
    pub achievement: AchievementDoc,
    pub skill: XpChange,
    pub category: XpChange,
}

#[async_trait]
pub trait SkillStore: Send + Sync {
    /// Backend name for health output
    fn kind(&self) -> &'static str;

    /// Insert a profile; a taken email yields `Conflict`
    async fn insert_profile(&self, profile: ProfileDoc) -> Result<ProfileDoc>;

    async fn find_profile(&self, id: ObjectId) -> Result<Option<ProfileDoc>>;

    /// Lookup by already-normalized email
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<ProfileDoc>>;

    /// Insert a document and return it with its assigned id
    async fn insert<T: Entity>(&self, doc: T) -> Result<T>;

    async fn find<T: Entity>(&self, id: ObjectId) -> Result<Option<T>>;

    /// Documents matching the filter in listing order
    async fn list<T: Entity>(&self, filter: ListFilter) -> Result<Vec<T>>;

    /// Apply a patch and return the updated document, `None` when absent
    async fn update<T: Entity, P: Patch<T>>(&self, id: ObjectId, patch: &P) -> Result<Option<T>>;

    /// Delete the root and every descendant as one unit
    async fn delete(&self, root: DeleteRoot) -> Result<DeleteSummary>;

    /// Atomically add `amount` to a skill or category and rederive its level.
    /// Returns `None` when the entity does not exist.
    async fn award_xp(&self, pool: XpPool, id: ObjectId, amount: i64) -> Result<Option<XpChange>>;

    /// Persist the achievement and credit `achievement.xp_awarded` to both the
    /// skill and the category. Either everything is written or nothing is.
    async fn record_achievement(
        &self,
        achievement: AchievementDoc,
        target: AwardTarget,
    ) -> Result<RecordedAchievement>;

    /// Release backend resources
    async fn shutdown(&self) -> Result<()>;
}

/// The configured backend
pub enum Store {
    Memory(MemoryStore),
    Mongo(MongoStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub fn mongo(connection: Arc<MongoConnection>) -> Self {
        Self::Mongo(MongoStore::new(connection))
    }

    /// Whether the backend currently holds a live connection
    pub fn is_connected(&self) -> bool {
        match self {
            Self::Memory(_) => true,
            Self::Mongo(s) => s.connection().is_connected(),
        }
    }

    /// Connect if needed; fails when the backend is unreachable
    pub async fn ready(&self) -> Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Mongo(s) => s.connection().ensure_connected().await.map(|_| ()),
        }
    }
}

#[async_trait]
impl SkillStore for Store {
    fn kind(&self) -> &'static str {
        match self {
            Self::Memory(s) => s.kind(),
            Self::Mongo(s) => s.kind(),
        }
    }

    async fn insert_profile(&self, profile: ProfileDoc) -> Result<ProfileDoc> {
        match self {
            Self::Memory(s) => s.insert_profile(profile).await,
            Self::Mongo(s) => s.insert_profile(profile).await,
        }
    }

    async fn find_profile(&self, id: ObjectId) -> Result<Option<ProfileDoc>> {
        match self {
            Self::Memory(s) => s.find_profile(id).await,
            Self::Mongo(s) => s.find_profile(id).await,
        }
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<ProfileDoc>> {
        match self {
            Self::Memory(s) => s.find_profile_by_email(email).await,
            Self::Mongo(s) => s.find_profile_by_email(email).await,
        }
    }

    async fn insert<T: Entity>(&self, doc: T) -> Result<T> {
        match self {
            Self::Memory(s) => s.insert(doc).await,
            Self::Mongo(s) => s.insert(doc).await,
        }
    }

    async fn find<T: Entity>(&self, id: ObjectId) -> Result<Option<T>> {
        match self {
            Self::Memory(s) => s.find(id).await,
            Self::Mongo(s) => s.find(id).await,
        }
    }

    async fn list<T: Entity>(&self, filter: ListFilter) -> Result<Vec<T>> {
        match self {
            Self::Memory(s) => s.list(filter).await,
            Self::Mongo(s) => s.list(filter).await,
        }
    }

    async fn update<T: Entity, P: Patch<T>>(&self, id: ObjectId, patch: &P) -> Result<Option<T>> {
        match self {
            Self::Memory(s) => s.update(id, patch).await,
            Self::Mongo(s) => s.update(id, patch).await,
        }
    }

    async fn delete(&self, root: DeleteRoot) -> Result<DeleteSummary> {
        match self {
            Self::Memory(s) => s.delete(root).await,
            Self::Mongo(s) => s.delete(root).await,
        }
    }

    async fn award_xp(&self, pool: XpPool, id: ObjectId, amount: i64) -> Result<Option<XpChange>> {
        match self {
            Self::Memory(s) => s.award_xp(pool, id, amount).await,
            Self::Mongo(s) => s.award_xp(pool, id, amount).await,
        }
    }

    async fn record_achievement(
        &self,
        achievement: AchievementDoc,
        target: AwardTarget,
    ) -> Result<RecordedAchievement> {
        match self {
            Self::Memory(s) => s.record_achievement(achievement, target).await,
            Self::Mongo(s) => s.record_achievement(achievement, target).await,
        }
    }

    async fn shutdown(&self) -> Result<()> {
        match self {
            Self::Memory(s) => s.shutdown().await,
            Self::Mongo(s) => s.shutdown().await,
        }
    }
}

/// Ids touched by a cascading delete, gathered top-down
#[derive(Debug, Clone, Default)]
pub struct CascadeIds {
    pub categories: Vec<ObjectId>,
    pub skills: Vec<ObjectId>,
    pub sub_skills: Vec<ObjectId>,
    pub challenges: Vec<ObjectId>,
    pub achievements: Vec<ObjectId>,
}

/// XP awards must be positive and at most `MAX_XP_REWARD`; profile XP is
/// derived and never awarded
pub fn check_award(pool: XpPool, amount: i64) -> Result<()> {
    if pool == XpPool::Profile {
        return Err(SkillTreeError::Validation(
            "Profile XP is derived from its skills and categories".into(),
        ));
    }
    if amount < 1 {
        return Err(SkillTreeError::Validation(format!(
            "XP amount must be positive, got {}",
            amount
        )));
    }
    if amount > MAX_XP_REWARD {
        return Err(SkillTreeError::Validation(format!(
            "XP amount must be at most {}, got {}",
            MAX_XP_REWARD, amount
        )));
    }
    Ok(())
}
