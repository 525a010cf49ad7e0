//! Achievement cascade
//!
//! Recording an achievement walks Challenge → SubSkill → Skill → Category,
//! then asks the store to persist the achievement and credit the challenge's
//! XP reward to both the skill and the category in one transaction. The
//! whole chain is resolved before anything is written, so a broken hierarchy
//! fails the request without leaving an achievement behind.

use bson::{oid::ObjectId, DateTime};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{
    AchievementDoc, AchievementUpdate, CategoryDoc, ChallengeDoc, SkillDoc, SubSkillDoc,
};
use crate::db::{AwardTarget, DeleteRoot, DeleteSummary, ListFilter, SkillStore, Store, XpCarrier};
use crate::leveling::XpChange;
use crate::logging::ActivityLogger;
use crate::services::Catalog;
use crate::types::views::{
    AchievementView, CategoryView, ChallengeView, SkillView, SubSkillView,
};
use crate::types::{Result, SkillTreeError};

/// Challenge plus every ancestor up to its category
#[derive(Debug, Clone)]
pub struct ChallengeLineage {
    pub challenge: ChallengeDoc,
    pub sub_skill: SubSkillDoc,
    pub skill: SkillDoc,
    pub category: CategoryDoc,
}

/// A recorded achievement with its hierarchy after the XP award
#[derive(Debug, Clone)]
pub struct CompletedAchievement {
    pub achievement: AchievementDoc,
    pub lineage: ChallengeLineage,
    pub skill_change: XpChange,
    pub category_change: XpChange,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedAchievementView {
    pub achievement: AchievementView,
    pub challenge: ChallengeView,
    pub sub_skill: SubSkillView,
    pub skill: SkillView,
    pub category: CategoryView,
    pub xp_changes: Vec<XpChange>,
}

impl From<&CompletedAchievement> for CompletedAchievementView {
    fn from(done: &CompletedAchievement) -> Self {
        Self {
            achievement: AchievementView::from(&done.achievement),
            challenge: ChallengeView::from(&done.lineage.challenge),
            sub_skill: SubSkillView::from(&done.lineage.sub_skill),
            skill: SkillView::from(&done.lineage.skill),
            category: CategoryView::from(&done.lineage.category),
            xp_changes: vec![done.skill_change, done.category_change],
        }
    }
}

#[derive(Clone)]
pub struct AchievementCascade {
    store: Arc<Store>,
    catalog: Catalog,
    activity: ActivityLogger,
}

impl AchievementCascade {
    pub fn new(store: Arc<Store>, activity: ActivityLogger) -> Self {
        Self {
            catalog: Catalog::new(Arc::clone(&store)),
            store,
            activity,
        }
    }

    /// Resolve a challenge and its ancestors, all owned by `profile`
    pub async fn lineage(&self, profile: ObjectId, challenge_id: ObjectId) -> Result<ChallengeLineage> {
        let challenge = self
            .catalog
            .owned::<ChallengeDoc>(profile, challenge_id)
            .await?;
        let sub_skill = self
            .catalog
            .owned::<SubSkillDoc>(profile, challenge.sub_skill_id)
            .await?;
        let skill = self
            .catalog
            .owned::<SkillDoc>(profile, sub_skill.skill_id)
            .await?;
        let category = self
            .catalog
            .owned::<CategoryDoc>(profile, skill.category_id)
            .await?;

        Ok(ChallengeLineage {
            challenge,
            sub_skill,
            skill,
            category,
        })
    }

    /// Record a completion and award the challenge's XP
    pub async fn record(
        &self,
        profile: ObjectId,
        challenge_id: ObjectId,
        notes: Option<String>,
        completed_at: Option<DateTime>,
    ) -> Result<CompletedAchievement> {
        let mut lineage = self.lineage(profile, challenge_id).await.map_err(|e| {
            warn!(%profile, %challenge_id, error = %e, "Achievement rejected");
            e
        })?;

        let (Some(sub_skill_id), Some(skill_id), Some(category_id)) =
            (lineage.sub_skill._id, lineage.skill._id, lineage.category._id)
        else {
            return Err(SkillTreeError::Internal(
                "Stored hierarchy document has no id".into(),
            ));
        };

        let xp_reward = lineage.challenge.xp_reward;
        let doc = AchievementDoc::new(
            profile,
            challenge_id,
            completed_at.unwrap_or_else(DateTime::now),
            notes.unwrap_or_default(),
            xp_reward,
        );

        let recorded = self
            .store
            .record_achievement(
                doc,
                AwardTarget {
                    challenge_id,
                    sub_skill_id,
                    skill_id,
                    category_id,
                },
            )
            .await?;

        lineage.skill.set_xp(recorded.skill.xp_after);
        lineage.category.set_xp(recorded.category.xp_after);

        let achievement_id = recorded
            .achievement
            ._id
            .map(|id| id.to_hex())
            .unwrap_or_default();
        info!(
            %profile,
            achievement = %achievement_id,
            challenge = %challenge_id,
            xp = xp_reward,
            skill_level = recorded.skill.level_after,
            category_level = recorded.category.level_after,
            "Achievement recorded"
        );
        if recorded.skill.leveled_up() {
            info!(skill = %skill_id, level = recorded.skill.level_after, "Skill leveled up");
        }
        if recorded.category.leveled_up() {
            info!(category = %category_id, level = recorded.category.level_after, "Category leveled up");
        }

        let profile_hex = profile.to_hex();
        self.activity
            .log_achievement(&profile_hex, &achievement_id, xp_reward)
            .await;
        self.activity
            .log_xp_change(&profile_hex, &skill_id.to_hex(), &recorded.skill)
            .await;
        self.activity
            .log_xp_change(&profile_hex, &category_id.to_hex(), &recorded.category)
            .await;

        Ok(CompletedAchievement {
            achievement: recorded.achievement,
            lineage,
            skill_change: recorded.skill,
            category_change: recorded.category,
        })
    }

    pub async fn list(
        &self,
        profile: ObjectId,
        challenge_id: Option<ObjectId>,
    ) -> Result<Vec<AchievementDoc>> {
        self.store
            .list(ListFilter::owned_by(profile).with_parent(challenge_id))
            .await
    }

    pub async fn get(&self, profile: ObjectId, id: ObjectId) -> Result<AchievementDoc> {
        self.catalog.owned(profile, id).await
    }

    /// Notes and completion time only; the awarded XP is fixed
    pub async fn update(
        &self,
        profile: ObjectId,
        id: ObjectId,
        update: AchievementUpdate,
    ) -> Result<AchievementDoc> {
        self.catalog.owned::<AchievementDoc>(profile, id).await?;
        self.store
            .update::<AchievementDoc, _>(id, &update)
            .await?
            .ok_or_else(|| SkillTreeError::not_found("Achievement", id))
    }

    /// Remove the record. XP it awarded stays with the skill and category.
    pub async fn delete(&self, profile: ObjectId, id: ObjectId) -> Result<DeleteSummary> {
        self.catalog.owned::<AchievementDoc>(profile, id).await?;
        let summary = self.store.delete(DeleteRoot::Achievement(id)).await?;

        info!(%profile, achievement = %id, "Achievement deleted");
        self.activity
            .log_achievement_deleted(&profile.to_hex(), &id.to_hex())
            .await;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        cascade: AchievementCascade,
        catalog: Catalog,
        profile: ObjectId,
        category: ObjectId,
        skill: ObjectId,
        sub_skill: ObjectId,
        challenge: ObjectId,
    }

    async fn fixture(xp_reward: i64) -> Fixture {
        let store = Arc::new(Store::memory());
        let catalog = Catalog::new(Arc::clone(&store));
        let cascade = AchievementCascade::new(store, ActivityLogger::new("test".into()));
        let profile = ObjectId::new();

        let category = catalog.create_category(profile, "Music", None).await.unwrap();
        let skill = catalog
            .create_skill(profile, category._id.unwrap(), "Guitar", None)
            .await
            .unwrap();
        let sub_skill = catalog
            .create_sub_skill(profile, skill._id.unwrap(), "Chords", None)
            .await
            .unwrap();
        let challenge = catalog
            .create_challenge(profile, sub_skill._id.unwrap(), "Learn G major", None, Some(xp_reward))
            .await
            .unwrap();

        Fixture {
            cascade,
            catalog,
            profile,
            category: category._id.unwrap(),
            skill: skill._id.unwrap(),
            sub_skill: sub_skill._id.unwrap(),
            challenge: challenge._id.unwrap(),
        }
    }

    #[tokio::test]
    async fn test_record_awards_skill_and_category_independently() {
        let f = fixture(25).await;

        let done = f
            .cascade
            .record(f.profile, f.challenge, Some("Finally".into()), None)
            .await
            .unwrap();

        assert_eq!(done.achievement.xp_awarded, 25);
        assert_eq!(done.achievement.notes, "Finally");
        assert_eq!(done.lineage.skill.xp, 25);
        assert_eq!(done.lineage.category.xp, 25);
        assert_eq!(done.lineage.sub_skill._id, Some(f.sub_skill));

        let skill = f.catalog.get_skill(f.profile, f.skill).await.unwrap();
        let category = f.catalog.get_category(f.profile, f.category).await.unwrap();
        assert_eq!(skill.xp, 25);
        assert_eq!(category.xp, 25);
    }

    #[tokio::test]
    async fn test_skill_levels_up_at_one_hundred() {
        let f = fixture(25).await;

        for _ in 0..3 {
            f.cascade.record(f.profile, f.challenge, None, None).await.unwrap();
        }
        let skill = f.catalog.get_skill(f.profile, f.skill).await.unwrap();
        assert_eq!((skill.xp, skill.level), (75, 1));

        let done = f.cascade.record(f.profile, f.challenge, None, None).await.unwrap();
        assert_eq!(done.lineage.skill.xp, 100);
        assert_eq!(done.lineage.skill.level, 2);
        assert!(done.skill_change.leveled_up());
        // Categories level every 200
        assert_eq!(done.lineage.category.level, 1);
        assert!(!done.category_change.leveled_up());
    }

    #[tokio::test]
    async fn test_foreign_challenge_is_not_found_and_awards_nothing() {
        let f = fixture(25).await;
        let intruder = ObjectId::new();

        let err = f
            .cascade
            .record(intruder, f.challenge, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::NotFound(_)));

        let skill = f.catalog.get_skill(f.profile, f.skill).await.unwrap();
        let category = f.catalog.get_category(f.profile, f.category).await.unwrap();
        assert_eq!(skill.xp, 0);
        assert_eq!(category.xp, 0);
        assert!(f.cascade.list(intruder, None).await.unwrap().is_empty());
        assert!(f.cascade.list(f.profile, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broken_hierarchy_persists_nothing() {
        let f = fixture(25).await;
        f.catalog.delete_category(f.profile, f.category).await.unwrap();

        let err = f
            .cascade
            .record(f.profile, f.challenge, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::NotFound(_)));
        assert!(f.cascade.list(f.profile, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completed_at_defaults_and_list_order() {
        let f = fixture(10).await;
        let earlier = DateTime::from_millis(1_600_000_000_000);

        let old = f
            .cascade
            .record(f.profile, f.challenge, None, Some(earlier))
            .await
            .unwrap();
        let new = f.cascade.record(f.profile, f.challenge, None, None).await.unwrap();
        assert!(new.achievement.completed_at > earlier);

        let listed = f.cascade.list(f.profile, Some(f.challenge)).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|a| a._id).collect();
        assert_eq!(ids, vec![new.achievement._id, old.achievement._id]);
    }

    #[tokio::test]
    async fn test_delete_does_not_reverse_xp() {
        let f = fixture(40).await;
        let done = f.cascade.record(f.profile, f.challenge, None, None).await.unwrap();
        let id = done.achievement._id.unwrap();

        let updated = f
            .cascade
            .update(
                f.profile,
                id,
                AchievementUpdate {
                    notes: Some("Clean changes".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notes, "Clean changes");
        assert_eq!(updated.xp_awarded, 40);

        let summary = f.cascade.delete(f.profile, id).await.unwrap();
        assert_eq!(summary.achievements, 1);
        assert!(f.cascade.get(f.profile, id).await.is_err());

        let skill = f.catalog.get_skill(f.profile, f.skill).await.unwrap();
        assert_eq!(skill.xp, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_completions_keep_every_award() {
        let f = Arc::new(fixture(15).await);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let f = Arc::clone(&f);
                tokio::spawn(async move { f.cascade.record(f.profile, f.challenge, None, None).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let skill = f.catalog.get_skill(f.profile, f.skill).await.unwrap();
        let category = f.catalog.get_category(f.profile, f.category).await.unwrap();
        assert_eq!(skill.xp, 300);
        assert_eq!(skill.level, 4);
        assert_eq!(category.xp, 300);
        assert_eq!(category.level, 2);
        assert_eq!(f.cascade.list(f.profile, None).await.unwrap().len(), 20);
    }
}
