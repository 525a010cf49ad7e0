//! In-memory skill store
//!
//! Process-local tables holding BSON documents, one map per collection. A
//! single `RwLock` guards all tables, so every multi-document write (cascade
//! deletes, achievement + XP award) is one critical section. Used in dev mode
//! and by the test suite.

use async_trait::async_trait;
use bson::{oid::ObjectId, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::entity::{Entity, ListFilter, Patch, XpCarrier};
use crate::db::schemas::{
    AchievementDoc, CategoryDoc, ChallengeDoc, ProfileDoc, SkillDoc, SubSkillDoc,
    PROFILE_COLLECTION,
};
use crate::db::store::{
    check_award, AwardTarget, CascadeIds, DeleteRoot, DeleteSummary, RecordedAchievement,
    SkillStore,
};
use crate::leveling::{XpChange, XpPool};
use crate::types::{Result, SkillTreeError};

#[derive(Default)]
struct Tables {
    collections: HashMap<&'static str, BTreeMap<ObjectId, Document>>,
}

impl Tables {
    fn get<T: DeserializeOwned>(&self, collection: &str, id: ObjectId) -> Result<Option<T>> {
        match self.collections.get(collection).and_then(|c| c.get(&id)) {
            Some(raw) => Ok(Some(bson::from_document(raw.clone())?)),
            None => Ok(None),
        }
    }

    fn all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let Some(table) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        table
            .values()
            .map(|raw| bson::from_document(raw.clone()).map_err(SkillTreeError::from))
            .collect()
    }

    fn put(&mut self, collection: &'static str, id: ObjectId, raw: Document) {
        self.collections.entry(collection).or_default().insert(id, raw);
    }

    fn remove(&mut self, collection: &str, ids: &[ObjectId]) -> u64 {
        let Some(table) = self.collections.get_mut(collection) else {
            return 0;
        };
        ids.iter().filter(|id| table.remove(id).is_some()).count() as u64
    }

    fn existing<T: Entity>(&self, id: ObjectId) -> Vec<ObjectId> {
        let present = self
            .collections
            .get(T::COLLECTION)
            .is_some_and(|c| c.contains_key(&id));
        if present {
            vec![id]
        } else {
            Vec::new()
        }
    }

    /// Ids of `T` documents whose parent is one of `parents`
    fn children<T: Entity>(&self, parents: &[ObjectId]) -> Result<Vec<ObjectId>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .all::<T>(T::COLLECTION)?
            .into_iter()
            .filter(|doc| parents.contains(&doc.parent_id()))
            .filter_map(|doc| doc.id())
            .collect())
    }

    fn cascade(&self, root: DeleteRoot) -> Result<CascadeIds> {
        let mut ids = CascadeIds::default();
        match root {
            DeleteRoot::Category(id) => ids.categories = self.existing::<CategoryDoc>(id),
            DeleteRoot::Skill(id) => ids.skills = self.existing::<SkillDoc>(id),
            DeleteRoot::SubSkill(id) => ids.sub_skills = self.existing::<SubSkillDoc>(id),
            DeleteRoot::Challenge(id) => ids.challenges = self.existing::<ChallengeDoc>(id),
            DeleteRoot::Achievement(id) => ids.achievements = self.existing::<AchievementDoc>(id),
        }

        let skills = self.children::<SkillDoc>(&ids.categories)?;
        ids.skills.extend(skills);
        let sub_skills = self.children::<SubSkillDoc>(&ids.skills)?;
        ids.sub_skills.extend(sub_skills);
        let challenges = self.children::<ChallengeDoc>(&ids.sub_skills)?;
        ids.challenges.extend(challenges);
        let achievements = self.children::<AchievementDoc>(&ids.challenges)?;
        ids.achievements.extend(achievements);

        Ok(ids)
    }

    /// The challenge still hangs under the sub-skill, skill and category
    /// the award targets
    fn verify_lineage(&self, target: &AwardTarget) -> Result<()> {
        let challenge = self
            .get::<ChallengeDoc>(ChallengeDoc::COLLECTION, target.challenge_id)?
            .filter(|c| c.sub_skill_id == target.sub_skill_id)
            .ok_or_else(|| SkillTreeError::not_found("Challenge", target.challenge_id))?;
        let sub_skill = self
            .get::<SubSkillDoc>(SubSkillDoc::COLLECTION, challenge.sub_skill_id)?
            .filter(|s| s.skill_id == target.skill_id)
            .ok_or_else(|| SkillTreeError::not_found("SubSkill", target.sub_skill_id))?;
        self.get::<SkillDoc>(SkillDoc::COLLECTION, sub_skill.skill_id)?
            .filter(|s| s.category_id == target.category_id)
            .ok_or_else(|| SkillTreeError::not_found("Skill", target.skill_id))?;
        Ok(())
    }

    /// Compute an XP award without writing it
    fn prepare_award<T: XpCarrier>(
        &self,
        id: ObjectId,
        amount: i64,
    ) -> Result<Option<(XpChange, Document)>> {
        let Some(mut doc) = self.get::<T>(T::COLLECTION, id)? else {
            return Ok(None);
        };
        let change = XpChange::apply(T::POOL, doc.xp(), amount)?;
        doc.set_xp(change.xp_after);
        doc.mut_metadata().touch();
        Ok(Some((change, to_raw(&doc)?)))
    }
}

fn to_raw<T: Serialize>(doc: &T) -> Result<Document> {
    Ok(bson::to_document(doc)?)
}

/// Skill store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SkillStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert_profile(&self, mut profile: ProfileDoc) -> Result<ProfileDoc> {
        let mut tables = self.tables.write().await;

        let taken = tables
            .all::<ProfileDoc>(PROFILE_COLLECTION)?
            .iter()
            .any(|p| p.email == profile.email);
        if taken {
            return Err(SkillTreeError::Conflict(
                "An account with this email already exists".into(),
            ));
        }

        let id = ObjectId::new();
        profile._id = Some(id);
        profile.metadata.stamp_created();
        tables.put(PROFILE_COLLECTION, id, to_raw(&profile)?);
        Ok(profile)
    }

    async fn find_profile(&self, id: ObjectId) -> Result<Option<ProfileDoc>> {
        self.tables.read().await.get(PROFILE_COLLECTION, id)
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<ProfileDoc>> {
        Ok(self
            .tables
            .read()
            .await
            .all::<ProfileDoc>(PROFILE_COLLECTION)?
            .into_iter()
            .find(|p| p.email == email))
    }

    async fn insert<T: Entity>(&self, mut doc: T) -> Result<T> {
        let id = ObjectId::new();
        doc.set_id(id);
        doc.mut_metadata().stamp_created();
        let raw = to_raw(&doc)?;

        self.tables.write().await.put(T::COLLECTION, id, raw);
        debug!(kind = T::KIND, %id, "Inserted document");
        Ok(doc)
    }

    async fn find<T: Entity>(&self, id: ObjectId) -> Result<Option<T>> {
        self.tables.read().await.get(T::COLLECTION, id)
    }

    async fn list<T: Entity>(&self, filter: ListFilter) -> Result<Vec<T>> {
        let mut docs: Vec<T> = self
            .tables
            .read()
            .await
            .all::<T>(T::COLLECTION)?
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .collect();
        docs.sort_by(|a, b| a.listing_cmp(b));
        Ok(docs)
    }

    async fn update<T: Entity, P: Patch<T>>(&self, id: ObjectId, patch: &P) -> Result<Option<T>> {
        let mut tables = self.tables.write().await;
        let Some(mut doc) = tables.get::<T>(T::COLLECTION, id)? else {
            return Ok(None);
        };
        patch.apply(&mut doc);
        doc.mut_metadata().touch();
        tables.put(T::COLLECTION, id, to_raw(&doc)?);
        Ok(Some(doc))
    }

    async fn delete(&self, root: DeleteRoot) -> Result<DeleteSummary> {
        let mut tables = self.tables.write().await;
        let ids = tables.cascade(root)?;

        let summary = DeleteSummary {
            categories: tables.remove(CategoryDoc::COLLECTION, &ids.categories),
            skills: tables.remove(SkillDoc::COLLECTION, &ids.skills),
            sub_skills: tables.remove(SubSkillDoc::COLLECTION, &ids.sub_skills),
            challenges: tables.remove(ChallengeDoc::COLLECTION, &ids.challenges),
            achievements: tables.remove(AchievementDoc::COLLECTION, &ids.achievements),
        };
        debug!(?root, ?summary, "Cascade delete");
        Ok(summary)
    }

    async fn award_xp(&self, pool: XpPool, id: ObjectId, amount: i64) -> Result<Option<XpChange>> {
        check_award(pool, amount)?;
        let mut tables = self.tables.write().await;

        let prepared = match pool {
            XpPool::Skill => tables.prepare_award::<SkillDoc>(id, amount)?,
            _ => tables.prepare_award::<CategoryDoc>(id, amount)?,
        };
        let Some((change, raw)) = prepared else {
            return Ok(None);
        };

        let collection = match pool {
            XpPool::Skill => SkillDoc::COLLECTION,
            _ => CategoryDoc::COLLECTION,
        };
        tables.put(collection, id, raw);
        Ok(Some(change))
    }

    async fn record_achievement(
        &self,
        mut achievement: AchievementDoc,
        target: AwardTarget,
    ) -> Result<RecordedAchievement> {
        let amount = achievement.xp_awarded;
        check_award(XpPool::Skill, amount)?;

        let mut tables = self.tables.write().await;
        tables.verify_lineage(&target)?;

        // Everything is computed before the first write so a failure leaves
        // the tables untouched.
        let (skill, skill_raw) = tables
            .prepare_award::<SkillDoc>(target.skill_id, amount)?
            .ok_or_else(|| SkillTreeError::not_found("Skill", target.skill_id))?;
        let (category, category_raw) = tables
            .prepare_award::<CategoryDoc>(target.category_id, amount)?
            .ok_or_else(|| SkillTreeError::not_found("Category", target.category_id))?;

        let id = ObjectId::new();
        achievement._id = Some(id);
        achievement.metadata.stamp_created();
        let achievement_raw = to_raw(&achievement)?;

        tables.put(AchievementDoc::COLLECTION, id, achievement_raw);
        tables.put(SkillDoc::COLLECTION, target.skill_id, skill_raw);
        tables.put(CategoryDoc::COLLECTION, target.category_id, category_raw);

        Ok(RecordedAchievement {
            achievement,
            skill,
            category,
        })
    }

    async fn shutdown(&self) -> Result<()> {
        debug!("Memory store shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{CategoryUpdate, DEFAULT_XP_REWARD};
    use bson::DateTime;
    use std::sync::Arc;

    async fn seed_chain(store: &MemoryStore, profile: ObjectId) -> (CategoryDoc, SkillDoc, SubSkillDoc, ChallengeDoc) {
        let category = store
            .insert(CategoryDoc::new(profile, "Music".into(), String::new()))
            .await
            .unwrap();
        let skill = store
            .insert(SkillDoc::new(profile, category._id.unwrap(), "Guitar".into(), String::new()))
            .await
            .unwrap();
        let sub_skill = store
            .insert(SubSkillDoc::new(profile, skill._id.unwrap(), "Chords".into(), String::new()))
            .await
            .unwrap();
        let challenge = store
            .insert(ChallengeDoc::new(
                profile,
                sub_skill._id.unwrap(),
                "Learn G major".into(),
                String::new(),
                DEFAULT_XP_REWARD,
            ))
            .await
            .unwrap();
        (category, skill, sub_skill, challenge)
    }

    #[tokio::test]
    async fn test_list_orders_by_name_and_scopes_to_profile() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let other = ObjectId::new();

        for name in ["Writing", "Art", "Music"] {
            store
                .insert(CategoryDoc::new(me, name.into(), String::new()))
                .await
                .unwrap();
        }
        store
            .insert(CategoryDoc::new(other, "Cooking".into(), String::new()))
            .await
            .unwrap();

        let names: Vec<String> = store
            .list::<CategoryDoc>(ListFilter::owned_by(me))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Art", "Music", "Writing"]);
    }

    #[tokio::test]
    async fn test_update_patches_fields() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let category = store
            .insert(CategoryDoc::new(me, "Music".into(), String::new()))
            .await
            .unwrap();

        let patch = CategoryUpdate {
            name: Some("Sound".into()),
            description: None,
        };
        let updated = store
            .update::<CategoryDoc, _>(category._id.unwrap(), &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Sound");

        let missing = store
            .update::<CategoryDoc, _>(ObjectId::new(), &patch)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_skill_delete_leaves_no_orphans() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let (category, skill, sub_skill, _) = seed_chain(&store, me).await;
        store
            .insert(ChallengeDoc::new(me, sub_skill._id.unwrap(), "Barre chords".into(), String::new(), 20))
            .await
            .unwrap();

        let summary = store.delete(DeleteRoot::Skill(skill._id.unwrap())).await.unwrap();
        assert_eq!(summary.skills, 1);
        assert_eq!(summary.sub_skills, 1);
        assert_eq!(summary.challenges, 2);

        assert!(store.list::<ChallengeDoc>(ListFilter::owned_by(me)).await.unwrap().is_empty());
        assert!(store.list::<SubSkillDoc>(ListFilter::owned_by(me)).await.unwrap().is_empty());
        assert!(store
            .find::<CategoryDoc>(category._id.unwrap())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_root_is_empty() {
        let store = MemoryStore::new();
        let summary = store.delete(DeleteRoot::Category(ObjectId::new())).await.unwrap();
        assert_eq!(summary.total(), 0);
    }

    #[tokio::test]
    async fn test_award_xp_recomputes_level() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let (_, skill, _, _) = seed_chain(&store, me).await;
        let skill_id = skill._id.unwrap();

        store.award_xp(XpPool::Skill, skill_id, 75).await.unwrap();
        let change = store.award_xp(XpPool::Skill, skill_id, 25).await.unwrap().unwrap();
        assert_eq!(change.xp_after, 100);
        assert_eq!(change.level_after, 2);

        let stored = store.find::<SkillDoc>(skill_id).await.unwrap().unwrap();
        assert_eq!(stored.xp, 100);
        assert_eq!(stored.level, 2);

        assert!(store.award_xp(XpPool::Skill, ObjectId::new(), 5).await.unwrap().is_none());
        assert!(store.award_xp(XpPool::Skill, skill_id, 0).await.is_err());
        assert!(store.award_xp(XpPool::Profile, skill_id, 5).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_awards_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let me = ObjectId::new();
        let (category, skill, _, _) = seed_chain(&store, me).await;
        let category_id = category._id.unwrap();

        let handles = (0..50).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.award_xp(XpPool::Category, category_id, 7).await })
        });
        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        let stored = store.find::<CategoryDoc>(category_id).await.unwrap().unwrap();
        assert_eq!(stored.xp, 350);
        assert_eq!(stored.level, 2);
        let untouched = store.find::<SkillDoc>(skill._id.unwrap()).await.unwrap().unwrap();
        assert_eq!(untouched.xp, 0);
    }

    #[tokio::test]
    async fn test_record_achievement_is_all_or_nothing() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let (category, skill, sub_skill, challenge) = seed_chain(&store, me).await;

        let achievement = AchievementDoc::new(me, challenge._id.unwrap(), DateTime::now(), String::new(), 10);
        let result = store
            .record_achievement(
                achievement,
                AwardTarget {
                    challenge_id: challenge._id.unwrap(),
                    sub_skill_id: sub_skill._id.unwrap(),
                    skill_id: skill._id.unwrap(),
                    category_id: ObjectId::new(),
                },
            )
            .await;
        assert!(matches!(result, Err(SkillTreeError::NotFound(_))));

        assert!(store.list::<AchievementDoc>(ListFilter::owned_by(me)).await.unwrap().is_empty());
        let skill = store.find::<SkillDoc>(skill._id.unwrap()).await.unwrap().unwrap();
        assert_eq!(skill.xp, 0);
        let category = store.find::<CategoryDoc>(category._id.unwrap()).await.unwrap().unwrap();
        assert_eq!(category.xp, 0);
    }

    fn target_of(category: &CategoryDoc, skill: &SkillDoc, sub_skill: &SubSkillDoc, challenge: &ChallengeDoc) -> AwardTarget {
        AwardTarget {
            challenge_id: challenge._id.unwrap(),
            sub_skill_id: sub_skill._id.unwrap(),
            skill_id: skill._id.unwrap(),
            category_id: category._id.unwrap(),
        }
    }

    #[tokio::test]
    async fn test_record_achievement_after_challenge_delete_is_rejected() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let (category, skill, sub_skill, challenge) = seed_chain(&store, me).await;
        let target = target_of(&category, &skill, &sub_skill, &challenge);

        // Lineage was resolved, then the challenge went away before the write
        store.delete(DeleteRoot::Challenge(challenge._id.unwrap())).await.unwrap();

        let achievement = AchievementDoc::new(me, challenge._id.unwrap(), DateTime::now(), String::new(), 10);
        let result = store.record_achievement(achievement, target).await;
        assert!(matches!(result, Err(SkillTreeError::NotFound(_))));

        assert!(store.list::<AchievementDoc>(ListFilter::owned_by(me)).await.unwrap().is_empty());
        let skill = store.find::<SkillDoc>(skill._id.unwrap()).await.unwrap().unwrap();
        assert_eq!(skill.xp, 0);
    }

    #[tokio::test]
    async fn test_record_achievement_after_sub_skill_delete_is_rejected() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let (category, skill, sub_skill, challenge) = seed_chain(&store, me).await;
        let target = target_of(&category, &skill, &sub_skill, &challenge);

        let summary = store.delete(DeleteRoot::SubSkill(sub_skill._id.unwrap())).await.unwrap();
        assert_eq!(summary.challenges, 1);

        let achievement = AchievementDoc::new(me, challenge._id.unwrap(), DateTime::now(), String::new(), 10);
        let result = store.record_achievement(achievement, target).await;
        assert!(matches!(result, Err(SkillTreeError::NotFound(_))));

        assert!(store.list::<AchievementDoc>(ListFilter::owned_by(me)).await.unwrap().is_empty());
        let category = store.find::<CategoryDoc>(category._id.unwrap()).await.unwrap().unwrap();
        assert_eq!(category.xp, 0);
    }

    #[tokio::test]
    async fn test_record_achievement_rejects_mismatched_lineage() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let (category, skill, sub_skill, challenge) = seed_chain(&store, me).await;
        let mut target = target_of(&category, &skill, &sub_skill, &challenge);
        target.sub_skill_id = ObjectId::new();

        let achievement = AchievementDoc::new(me, challenge._id.unwrap(), DateTime::now(), String::new(), 10);
        let result = store.record_achievement(achievement, target).await;
        assert!(matches!(result, Err(SkillTreeError::NotFound(_))));

        let skill = store.find::<SkillDoc>(skill._id.unwrap()).await.unwrap().unwrap();
        assert_eq!(skill.xp, 0);
    }

    #[tokio::test]
    async fn test_record_achievement_awards_both_pools() {
        let store = MemoryStore::new();
        let me = ObjectId::new();
        let (category, skill, sub_skill, challenge) = seed_chain(&store, me).await;
        let target = target_of(&category, &skill, &sub_skill, &challenge);

        let achievement = AchievementDoc::new(me, challenge._id.unwrap(), DateTime::now(), String::new(), 150);
        let recorded = store.record_achievement(achievement, target).await.unwrap();
        assert_eq!(recorded.skill.xp_after, 150);
        assert_eq!(recorded.skill.level_after, 2);
        assert_eq!(recorded.category.level_after, 1);
        assert_eq!(store.list::<AchievementDoc>(ListFilter::owned_by(me)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store
            .insert_profile(ProfileDoc::new("Ada".into(), "ada@example.com".into(), "hash".into()))
            .await
            .unwrap();
        let err = store
            .insert_profile(ProfileDoc::new("Ada 2".into(), "ADA@example.com".into(), "hash".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::Conflict(_)));

        let found = store.find_profile_by_email("ada@example.com").await.unwrap();
        assert_eq!(found.unwrap().name, "Ada");
    }
}
