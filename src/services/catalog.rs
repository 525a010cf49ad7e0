//! Catalog service
//!
//! Create, read, update and delete for categories, skills, sub-skills and
//! challenges. Every operation is scoped to the acting profile: a document
//! owned by someone else is reported as not found. XP and level are never
//! writable here; they only move through the achievement cascade.

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::schemas::{
    CategoryDoc, CategoryUpdate, ChallengeDoc, ChallengeUpdate, SkillDoc, SkillUpdate,
    SubSkillDoc, SubSkillUpdate, DEFAULT_XP_REWARD,
};
use crate::db::{DeleteRoot, DeleteSummary, Entity, ListFilter, Patch, SkillStore, Store};
use crate::leveling::MAX_XP_REWARD;
use crate::types::{Result, SkillTreeError};

const MAX_NAME_LENGTH: usize = 200;

/// Trim and check a required name
pub fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SkillTreeError::Validation("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(SkillTreeError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn optional_name(name: Option<String>) -> Result<Option<String>> {
    name.as_deref().map(require_name).transpose()
}

pub fn require_xp_reward(xp_reward: i64) -> Result<i64> {
    if !(1..=MAX_XP_REWARD).contains(&xp_reward) {
        return Err(SkillTreeError::Validation(format!(
            "xpReward must be between 1 and {}, got {}",
            MAX_XP_REWARD, xp_reward
        )));
    }
    Ok(xp_reward)
}

#[derive(Clone)]
pub struct Catalog {
    store: Arc<Store>,
}

impl Catalog {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Fetch a document the profile owns, `NotFound` otherwise
    pub async fn owned<T: Entity>(&self, profile: ObjectId, id: ObjectId) -> Result<T> {
        match self.store.find::<T>(id).await? {
            Some(doc) if doc.profile_id() == profile => Ok(doc),
            _ => Err(SkillTreeError::not_found(T::KIND, id)),
        }
    }

    async fn patch<T: Entity, P: Patch<T>>(
        &self,
        profile: ObjectId,
        id: ObjectId,
        patch: &P,
    ) -> Result<T> {
        self.owned::<T>(profile, id).await?;
        let updated = self
            .store
            .update::<T, P>(id, patch)
            .await?
            .ok_or_else(|| SkillTreeError::not_found(T::KIND, id))?;
        debug!(kind = T::KIND, %id, "Updated");
        Ok(updated)
    }

    async fn remove<T: Entity>(
        &self,
        profile: ObjectId,
        id: ObjectId,
        root: DeleteRoot,
    ) -> Result<DeleteSummary> {
        self.owned::<T>(profile, id).await?;
        let summary = self.store.delete(root).await?;
        info!(
            kind = T::KIND,
            %id,
            removed = summary.total(),
            "Deleted with descendants"
        );
        Ok(summary)
    }

    // Categories

    pub async fn create_category(
        &self,
        profile: ObjectId,
        name: &str,
        description: Option<String>,
    ) -> Result<CategoryDoc> {
        let doc = CategoryDoc::new(profile, require_name(name)?, description.unwrap_or_default());
        self.store.insert(doc).await
    }

    pub async fn list_categories(&self, profile: ObjectId) -> Result<Vec<CategoryDoc>> {
        self.store.list(ListFilter::owned_by(profile)).await
    }

    pub async fn get_category(&self, profile: ObjectId, id: ObjectId) -> Result<CategoryDoc> {
        self.owned(profile, id).await
    }

    pub async fn update_category(
        &self,
        profile: ObjectId,
        id: ObjectId,
        mut update: CategoryUpdate,
    ) -> Result<CategoryDoc> {
        update.name = optional_name(update.name)?;
        self.patch(profile, id, &update).await
    }

    pub async fn delete_category(&self, profile: ObjectId, id: ObjectId) -> Result<DeleteSummary> {
        self.remove::<CategoryDoc>(profile, id, DeleteRoot::Category(id))
            .await
    }

    // Skills

    pub async fn create_skill(
        &self,
        profile: ObjectId,
        category_id: ObjectId,
        name: &str,
        description: Option<String>,
    ) -> Result<SkillDoc> {
        let name = require_name(name)?;
        self.owned::<CategoryDoc>(profile, category_id).await?;
        let doc = SkillDoc::new(profile, category_id, name, description.unwrap_or_default());
        self.store.insert(doc).await
    }

    pub async fn list_skills(
        &self,
        profile: ObjectId,
        category_id: Option<ObjectId>,
    ) -> Result<Vec<SkillDoc>> {
        self.store
            .list(ListFilter::owned_by(profile).with_parent(category_id))
            .await
    }

    pub async fn get_skill(&self, profile: ObjectId, id: ObjectId) -> Result<SkillDoc> {
        self.owned(profile, id).await
    }

    /// Moving a skill does not move XP it already contributed to the old
    /// category.
    pub async fn update_skill(
        &self,
        profile: ObjectId,
        id: ObjectId,
        mut update: SkillUpdate,
    ) -> Result<SkillDoc> {
        update.name = optional_name(update.name)?;
        if let Some(category_id) = update.category_id {
            self.owned::<CategoryDoc>(profile, category_id).await?;
        }
        self.patch(profile, id, &update).await
    }

    pub async fn delete_skill(&self, profile: ObjectId, id: ObjectId) -> Result<DeleteSummary> {
        self.remove::<SkillDoc>(profile, id, DeleteRoot::Skill(id))
            .await
    }

    // Sub-skills

    pub async fn create_sub_skill(
        &self,
        profile: ObjectId,
        skill_id: ObjectId,
        name: &str,
        description: Option<String>,
    ) -> Result<SubSkillDoc> {
        let name = require_name(name)?;
        self.owned::<SkillDoc>(profile, skill_id).await?;
        let doc = SubSkillDoc::new(profile, skill_id, name, description.unwrap_or_default());
        self.store.insert(doc).await
    }

    pub async fn list_sub_skills(
        &self,
        profile: ObjectId,
        skill_id: Option<ObjectId>,
    ) -> Result<Vec<SubSkillDoc>> {
        self.store
            .list(ListFilter::owned_by(profile).with_parent(skill_id))
            .await
    }

    pub async fn get_sub_skill(&self, profile: ObjectId, id: ObjectId) -> Result<SubSkillDoc> {
        self.owned(profile, id).await
    }

    pub async fn update_sub_skill(
        &self,
        profile: ObjectId,
        id: ObjectId,
        mut update: SubSkillUpdate,
    ) -> Result<SubSkillDoc> {
        update.name = optional_name(update.name)?;
        self.patch(profile, id, &update).await
    }

    pub async fn delete_sub_skill(&self, profile: ObjectId, id: ObjectId) -> Result<DeleteSummary> {
        self.remove::<SubSkillDoc>(profile, id, DeleteRoot::SubSkill(id))
            .await
    }

    // Challenges

    pub async fn create_challenge(
        &self,
        profile: ObjectId,
        sub_skill_id: ObjectId,
        name: &str,
        description: Option<String>,
        xp_reward: Option<i64>,
    ) -> Result<ChallengeDoc> {
        let name = require_name(name)?;
        let xp_reward = require_xp_reward(xp_reward.unwrap_or(DEFAULT_XP_REWARD))?;
        self.owned::<SubSkillDoc>(profile, sub_skill_id).await?;
        let doc = ChallengeDoc::new(
            profile,
            sub_skill_id,
            name,
            description.unwrap_or_default(),
            xp_reward,
        );
        self.store.insert(doc).await
    }

    pub async fn list_challenges(
        &self,
        profile: ObjectId,
        sub_skill_id: Option<ObjectId>,
    ) -> Result<Vec<ChallengeDoc>> {
        self.store
            .list(ListFilter::owned_by(profile).with_parent(sub_skill_id))
            .await
    }

    pub async fn get_challenge(&self, profile: ObjectId, id: ObjectId) -> Result<ChallengeDoc> {
        self.owned(profile, id).await
    }

    pub async fn update_challenge(
        &self,
        profile: ObjectId,
        id: ObjectId,
        mut update: ChallengeUpdate,
    ) -> Result<ChallengeDoc> {
        update.name = optional_name(update.name)?;
        if let Some(xp_reward) = update.xp_reward {
            require_xp_reward(xp_reward)?;
        }
        if let Some(sub_skill_id) = update.sub_skill_id {
            self.owned::<SubSkillDoc>(profile, sub_skill_id).await?;
        }
        self.patch(profile, id, &update).await
    }

    pub async fn delete_challenge(&self, profile: ObjectId, id: ObjectId) -> Result<DeleteSummary> {
        self.remove::<ChallengeDoc>(profile, id, DeleteRoot::Challenge(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(Store::memory()))
    }

    #[test]
    fn test_require_name() {
        assert_eq!(require_name("  Guitar ").unwrap(), "Guitar");
        assert!(require_name("   ").is_err());
        assert!(require_name(&"x".repeat(201)).is_err());
    }

    #[tokio::test]
    async fn test_create_chain_and_default_reward() {
        let catalog = catalog();
        let me = ObjectId::new();

        let category = catalog.create_category(me, "Music", None).await.unwrap();
        let skill = catalog
            .create_skill(me, category._id.unwrap(), "Guitar", Some("Six strings".into()))
            .await
            .unwrap();
        let sub_skill = catalog
            .create_sub_skill(me, skill._id.unwrap(), "Chords", None)
            .await
            .unwrap();
        let challenge = catalog
            .create_challenge(me, sub_skill._id.unwrap(), "Learn G major", None, None)
            .await
            .unwrap();

        assert_eq!(challenge.xp_reward, DEFAULT_XP_REWARD);
        assert_eq!(skill.description, "Six strings");
        assert_eq!(skill.level, 1);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let catalog = catalog();
        let me = ObjectId::new();

        let err = catalog.create_category(me, "", None).await.unwrap_err();
        assert!(matches!(err, SkillTreeError::Validation(_)));

        let category = catalog.create_category(me, "Music", None).await.unwrap();
        let skill = catalog
            .create_skill(me, category._id.unwrap(), "Guitar", None)
            .await
            .unwrap();
        let sub_skill = catalog
            .create_sub_skill(me, skill._id.unwrap(), "Chords", None)
            .await
            .unwrap();
        let err = catalog
            .create_challenge(me, sub_skill._id.unwrap(), "Zero", None, Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::Validation(_)));
    }

    #[tokio::test]
    async fn test_foreign_parent_is_not_found() {
        let catalog = catalog();
        let me = ObjectId::new();
        let someone_else = ObjectId::new();

        let theirs = catalog
            .create_category(someone_else, "Cooking", None)
            .await
            .unwrap();
        let err = catalog
            .create_skill(me, theirs._id.unwrap(), "Knife work", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::NotFound(_)));

        let err = catalog
            .get_category(me, theirs._id.unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::NotFound(_)));

        let err = catalog
            .delete_category(me, theirs._id.unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_and_list_by_parent() {
        let catalog = catalog();
        let me = ObjectId::new();

        let music = catalog.create_category(me, "Music", None).await.unwrap();
        let art = catalog.create_category(me, "Art", None).await.unwrap();
        let skill = catalog
            .create_skill(me, music._id.unwrap(), "Guitar", None)
            .await
            .unwrap();

        let moved = catalog
            .update_skill(
                me,
                skill._id.unwrap(),
                SkillUpdate {
                    name: Some(" Bass ".into()),
                    category_id: art._id,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.name, "Bass");
        assert_eq!(moved.category_id, art._id.unwrap());

        assert!(catalog.list_skills(me, music._id).await.unwrap().is_empty());
        assert_eq!(catalog.list_skills(me, art._id).await.unwrap().len(), 1);
        assert_eq!(catalog.list_skills(me, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_reward() {
        let catalog = catalog();
        let me = ObjectId::new();
        let category = catalog.create_category(me, "Music", None).await.unwrap();
        let skill = catalog
            .create_skill(me, category._id.unwrap(), "Guitar", None)
            .await
            .unwrap();
        let sub_skill = catalog
            .create_sub_skill(me, skill._id.unwrap(), "Chords", None)
            .await
            .unwrap();
        let challenge = catalog
            .create_challenge(me, sub_skill._id.unwrap(), "Learn G major", None, Some(25))
            .await
            .unwrap();

        let err = catalog
            .update_challenge(
                me,
                challenge._id.unwrap(),
                ChallengeUpdate {
                    xp_reward: Some(-5),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::Validation(_)));

        let unchanged = catalog
            .get_challenge(me, challenge._id.unwrap())
            .await
            .unwrap();
        assert_eq!(unchanged.xp_reward, 25);
    }

    #[tokio::test]
    async fn test_oversized_reward_is_rejected() {
        let catalog = catalog();
        let me = ObjectId::new();
        let category = catalog.create_category(me, "Music", None).await.unwrap();
        let skill = catalog
            .create_skill(me, category._id.unwrap(), "Guitar", None)
            .await
            .unwrap();
        let sub_skill = catalog
            .create_sub_skill(me, skill._id.unwrap(), "Chords", None)
            .await
            .unwrap();
        let sub_skill_id = sub_skill._id.unwrap();

        let err = catalog
            .create_challenge(me, sub_skill_id, "Everything", None, Some(i64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::Validation(_)));

        let top = catalog
            .create_challenge(me, sub_skill_id, "Marathon", None, Some(MAX_XP_REWARD))
            .await
            .unwrap();
        let err = catalog
            .update_challenge(
                me,
                top._id.unwrap(),
                ChallengeUpdate {
                    xp_reward: Some(MAX_XP_REWARD + 1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::Validation(_)));
        assert_eq!(catalog.list_challenges(me, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_category_delete_cascades() {
        let catalog = catalog();
        let me = ObjectId::new();
        let category = catalog.create_category(me, "Music", None).await.unwrap();
        let skill = catalog
            .create_skill(me, category._id.unwrap(), "Guitar", None)
            .await
            .unwrap();
        let sub_skill = catalog
            .create_sub_skill(me, skill._id.unwrap(), "Chords", None)
            .await
            .unwrap();
        catalog
            .create_challenge(me, sub_skill._id.unwrap(), "Learn G major", None, None)
            .await
            .unwrap();

        let summary = catalog
            .delete_category(me, category._id.unwrap())
            .await
            .unwrap();
        assert_eq!(summary.total(), 4);
        assert!(catalog.list_challenges(me, None).await.unwrap().is_empty());
        assert!(catalog.list_sub_skills(me, None).await.unwrap().is_empty());
    }
}
