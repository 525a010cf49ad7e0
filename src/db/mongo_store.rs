//! MongoDB-backed skill store
//!
//! Deletes are soft deletes. Cascading deletes and achievement recording run
//! inside a multi-document transaction, which needs a replica set deployment.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::error::UNKNOWN_TRANSACTION_COMMIT_RESULT;
use mongodb::{options::ReturnDocument, ClientSession};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::connection::MongoConnection;
use crate::db::entity::{Entity, ListFilter, Patch, XpCarrier};
use crate::db::mongo::MongoCollection;
use crate::db::schemas::{
    AchievementDoc, CategoryDoc, ChallengeDoc, ProfileDoc, SkillDoc, SubSkillDoc,
    PROFILE_COLLECTION,
};
use crate::db::store::{
    check_award, AwardTarget, CascadeIds, DeleteRoot, DeleteSummary, RecordedAchievement,
    SkillStore,
};
use crate::leveling::{add_xp, XpChange, XpPool};
use crate::types::{Result, SkillTreeError};

/// Attempts per transaction before a transient failure is surfaced
const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// Matches `id` only while adding `amount` keeps xp within i64
fn award_filter(id: ObjectId, amount: i64) -> Document {
    doc! {
        "_id": id,
        "$or": [
            { "xp": { "$exists": false } },
            { "xp": { "$lte": i64::MAX - amount } },
        ],
    }
}

/// Update pipeline that adds `amount` to xp, then rederives level from the
/// new total
fn xp_award_pipeline(amount: i64, per_level: i64) -> Vec<Document> {
    vec![
        doc! {
            "$set": {
                "xp": { "$add": [ { "$ifNull": ["$xp", 0_i64] }, amount ] },
                "metadata.updated_at": "$$NOW",
            }
        },
        doc! {
            "$set": {
                "level": {
                    "$toLong": {
                        "$add": [ { "$floor": { "$divide": ["$xp", per_level] } }, 1 ]
                    }
                }
            }
        },
    ]
}

/// Run `op` again while it fails with a transient transaction error
async fn retry_transient<R, F, Fut>(mut op: F) -> Result<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < MAX_TRANSACTION_ATTEMPTS => {
                warn!(attempt, error = %e, "Transient transaction error, retrying");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

pub struct MongoStore {
    connection: Arc<MongoConnection>,
}

impl MongoStore {
    pub fn new(connection: Arc<MongoConnection>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &MongoConnection {
        &self.connection
    }

    async fn collection<T: Entity>(&self) -> Result<MongoCollection<T>> {
        let client = self.connection.ensure_connected().await?;
        Ok(client.collection::<T>(T::COLLECTION))
    }

    async fn profiles(&self) -> Result<MongoCollection<ProfileDoc>> {
        let client = self.connection.ensure_connected().await?;
        Ok(client.collection::<ProfileDoc>(PROFILE_COLLECTION))
    }

    async fn start_transaction(&self) -> Result<ClientSession> {
        let client = self.connection.ensure_connected().await?;
        let mut session = client.inner().start_session().await?;
        session.start_transaction().await?;
        Ok(session)
    }

    /// Increment xp and rederive level in one update pipeline. Returns the
    /// change computed from the pre-image, `None` when no live document
    /// matched.
    async fn award<T: XpCarrier>(
        &self,
        id: ObjectId,
        amount: i64,
        session: Option<&mut ClientSession>,
    ) -> Result<Option<XpChange>> {
        let collection = self.collection::<T>().await?;
        let pipeline = xp_award_pipeline(amount, T::POOL.xp_per_level());

        let before = collection
            .find_one_and_update(award_filter(id, amount), pipeline, ReturnDocument::Before, session)
            .await?;

        match before {
            Some(doc) => XpChange::apply(T::POOL, doc.xp(), amount).map(Some),
            // Missing, or held back by the xp ceiling in the filter
            None => match collection.find_one(doc! { "_id": id }).await? {
                Some(doc) => {
                    add_xp(doc.xp(), amount)?;
                    Err(SkillTreeError::Conflict(format!(
                        "{} {} changed during the award",
                        T::KIND,
                        id
                    )))
                }
                None => Ok(None),
            },
        }
    }

    async fn live_ids<T: Entity>(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<Vec<ObjectId>> {
        self.collection::<T>()
            .await?
            .ids_matching(filter, session)
            .await
    }

    async fn children<T: Entity>(
        &self,
        parents: &[ObjectId],
        session: &mut ClientSession,
    ) -> Result<Vec<ObjectId>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        let mut filter = Document::new();
        filter.insert(T::PARENT_FIELD, doc! { "$in": parents.to_vec() });
        self.live_ids::<T>(filter, session).await
    }

    async fn cascade(&self, root: DeleteRoot, session: &mut ClientSession) -> Result<CascadeIds> {
        let mut ids = CascadeIds::default();
        match root {
            DeleteRoot::Category(id) => {
                ids.categories = self.live_ids::<CategoryDoc>(doc! { "_id": id }, session).await?
            }
            DeleteRoot::Skill(id) => {
                ids.skills = self.live_ids::<SkillDoc>(doc! { "_id": id }, session).await?
            }
            DeleteRoot::SubSkill(id) => {
                ids.sub_skills = self.live_ids::<SubSkillDoc>(doc! { "_id": id }, session).await?
            }
            DeleteRoot::Challenge(id) => {
                ids.challenges = self.live_ids::<ChallengeDoc>(doc! { "_id": id }, session).await?
            }
            DeleteRoot::Achievement(id) => {
                ids.achievements = self
                    .live_ids::<AchievementDoc>(doc! { "_id": id }, session)
                    .await?
            }
        }

        let skills = self.children::<SkillDoc>(&ids.categories, session).await?;
        ids.skills.extend(skills);
        let sub_skills = self.children::<SubSkillDoc>(&ids.skills, session).await?;
        ids.sub_skills.extend(sub_skills);
        let challenges = self.children::<ChallengeDoc>(&ids.sub_skills, session).await?;
        ids.challenges.extend(challenges);
        let achievements = self.children::<AchievementDoc>(&ids.challenges, session).await?;
        ids.achievements.extend(achievements);

        Ok(ids)
    }

    async fn delete_in(&self, root: DeleteRoot, session: &mut ClientSession) -> Result<DeleteSummary> {
        let ids = self.cascade(root, session).await?;

        Ok(DeleteSummary {
            categories: self
                .collection::<CategoryDoc>()
                .await?
                .soft_delete_ids(&ids.categories, session)
                .await?,
            skills: self
                .collection::<SkillDoc>()
                .await?
                .soft_delete_ids(&ids.skills, session)
                .await?,
            sub_skills: self
                .collection::<SubSkillDoc>()
                .await?
                .soft_delete_ids(&ids.sub_skills, session)
                .await?,
            challenges: self
                .collection::<ChallengeDoc>()
                .await?
                .soft_delete_ids(&ids.challenges, session)
                .await?,
            achievements: self
                .collection::<AchievementDoc>()
                .await?
                .soft_delete_ids(&ids.achievements, session)
                .await?,
        })
    }

    async fn record_in(
        &self,
        mut achievement: AchievementDoc,
        target: AwardTarget,
        session: &mut ClientSession,
    ) -> Result<RecordedAchievement> {
        let amount = achievement.xp_awarded;

        // Re-read the links inside the transaction. The write on each
        // document conflicts with a concurrent cascade delete.
        self.collection::<ChallengeDoc>()
            .await?
            .lock_one(
                doc! { "_id": target.challenge_id, "sub_skill_id": target.sub_skill_id },
                session,
            )
            .await?
            .ok_or_else(|| SkillTreeError::not_found("Challenge", target.challenge_id))?;
        self.collection::<SubSkillDoc>()
            .await?
            .lock_one(
                doc! { "_id": target.sub_skill_id, "skill_id": target.skill_id },
                session,
            )
            .await?
            .ok_or_else(|| SkillTreeError::not_found("SubSkill", target.sub_skill_id))?;
        self.collection::<SkillDoc>()
            .await?
            .find_one(doc! { "_id": target.skill_id, "category_id": target.category_id })
            .await?
            .ok_or_else(|| SkillTreeError::not_found("Skill", target.skill_id))?;

        let skill = self
            .award::<SkillDoc>(target.skill_id, amount, Some(&mut *session))
            .await?
            .ok_or_else(|| SkillTreeError::not_found("Skill", target.skill_id))?;
        let category = self
            .award::<CategoryDoc>(target.category_id, amount, Some(&mut *session))
            .await?
            .ok_or_else(|| SkillTreeError::not_found("Category", target.category_id))?;

        achievement.metadata.stamp_created();
        let id = self
            .collection::<AchievementDoc>()
            .await?
            .insert_one(achievement.clone(), Some(&mut *session))
            .await?;
        achievement.set_id(id);

        Ok(RecordedAchievement {
            achievement,
            skill,
            category,
        })
    }
}

/// Commit, retrying while the server reports the outcome as unknown
async fn commit(session: &mut ClientSession) -> Result<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_TRANSACTION_ATTEMPTS =>
            {
                warn!(attempt, error = %e, "Commit result unknown, retrying commit");
                attempt += 1;
            }
            Err(e) => return Err(SkillTreeError::database("Commit failed", e)),
        }
    }
}

/// Commit on success, abort on failure
async fn finish<T>(mut session: ClientSession, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            commit(&mut session).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(abort_err) = session.abort_transaction().await {
                warn!(error = %abort_err, "Transaction abort failed");
            }
            Err(e)
        }
    }
}

#[async_trait]
impl SkillStore for MongoStore {
    fn kind(&self) -> &'static str {
        "mongo"
    }

    async fn insert_profile(&self, mut profile: ProfileDoc) -> Result<ProfileDoc> {
        profile.metadata.stamp_created();
        let id = self
            .profiles()
            .await?
            .insert_one(profile.clone(), None)
            .await
            .map_err(|e| match e {
                SkillTreeError::Conflict(_) => {
                    SkillTreeError::Conflict("An account with this email already exists".into())
                }
                other => other,
            })?;
        profile._id = Some(id);
        Ok(profile)
    }

    async fn find_profile(&self, id: ObjectId) -> Result<Option<ProfileDoc>> {
        self.profiles().await?.find_one(doc! { "_id": id }).await
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<ProfileDoc>> {
        self.profiles().await?.find_one(doc! { "email": email }).await
    }

    async fn insert<T: Entity>(&self, mut doc: T) -> Result<T> {
        doc.mut_metadata().stamp_created();
        let id = self
            .collection::<T>()
            .await?
            .insert_one(doc.clone(), None)
            .await?;
        doc.set_id(id);
        debug!(kind = T::KIND, %id, "Inserted document");
        Ok(doc)
    }

    async fn find<T: Entity>(&self, id: ObjectId) -> Result<Option<T>> {
        self.collection::<T>().await?.find_one(doc! { "_id": id }).await
    }

    async fn list<T: Entity>(&self, filter: ListFilter) -> Result<Vec<T>> {
        let (field, direction) = T::SORT;
        let mut sort = Document::new();
        sort.insert(field, direction);
        sort.insert("_id", direction);

        self.collection::<T>()
            .await?
            .find_many(filter.to_document::<T>(), sort)
            .await
    }

    async fn update<T: Entity, P: Patch<T>>(&self, id: ObjectId, patch: &P) -> Result<Option<T>> {
        let mut set = patch.set_document();
        set.insert("metadata.updated_at", DateTime::now());

        self.collection::<T>()
            .await?
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": set },
                ReturnDocument::After,
                None,
            )
            .await
    }

    async fn delete(&self, root: DeleteRoot) -> Result<DeleteSummary> {
        let summary = retry_transient(move || async move {
            let mut session = self.start_transaction().await?;
            let outcome = self.delete_in(root, &mut session).await;
            finish(session, outcome).await
        })
        .await?;
        debug!(?root, ?summary, "Cascade delete committed");
        Ok(summary)
    }

    async fn award_xp(&self, pool: XpPool, id: ObjectId, amount: i64) -> Result<Option<XpChange>> {
        check_award(pool, amount)?;
        match pool {
            XpPool::Skill => self.award::<SkillDoc>(id, amount, None).await,
            _ => self.award::<CategoryDoc>(id, amount, None).await,
        }
    }

    async fn record_achievement(
        &self,
        achievement: AchievementDoc,
        target: AwardTarget,
    ) -> Result<RecordedAchievement> {
        check_award(XpPool::Skill, achievement.xp_awarded)?;

        retry_transient(move || {
            let achievement = achievement.clone();
            async move {
                let mut session = self.start_transaction().await?;
                let outcome = self.record_in(achievement, target, &mut session).await;
                finish(session, outcome).await
            }
        })
        .await
    }

    async fn shutdown(&self) -> Result<()> {
        self.connection.shutdown().await;
        Ok(())
    }
}
