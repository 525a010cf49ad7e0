//! JSON views returned by the API
//!
//! Ids are hex ObjectIds and timestamps are RFC 3339 strings. Internal fields
//! (owning profile, soft-delete metadata, password hashes) never appear here.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::schemas::{
    AchievementDoc, CategoryDoc, ChallengeDoc, Metadata, ProfileDoc, SkillDoc, SubSkillDoc,
};
use crate::leveling::{LevelProgress, XpPool};

fn hex(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

fn timestamps(metadata: &Metadata) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    (
        metadata.created_at.map(|t| t.to_chrono()),
        metadata.updated_at.map(|t| t.to_chrono()),
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&ProfileDoc> for ProfileView {
    fn from(doc: &ProfileDoc) -> Self {
        Self {
            id: hex(doc._id),
            name: doc.name.clone(),
            email: doc.email.clone(),
            created_at: doc.metadata.created_at.map(|t| t.to_chrono()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub xp: i64,
    pub level: i64,
    pub progress: LevelProgress,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&CategoryDoc> for CategoryView {
    fn from(doc: &CategoryDoc) -> Self {
        let (created_at, updated_at) = timestamps(&doc.metadata);
        Self {
            id: hex(doc._id),
            name: doc.name.clone(),
            description: doc.description.clone(),
            xp: doc.xp,
            level: doc.level,
            progress: LevelProgress::new(XpPool::Category, doc.xp),
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillView {
    pub id: String,
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub xp: i64,
    pub level: i64,
    pub progress: LevelProgress,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&SkillDoc> for SkillView {
    fn from(doc: &SkillDoc) -> Self {
        let (created_at, updated_at) = timestamps(&doc.metadata);
        Self {
            id: hex(doc._id),
            category_id: doc.category_id.to_hex(),
            name: doc.name.clone(),
            description: doc.description.clone(),
            xp: doc.xp,
            level: doc.level,
            progress: LevelProgress::new(XpPool::Skill, doc.xp),
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSkillView {
    pub id: String,
    pub skill_id: String,
    pub name: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&SubSkillDoc> for SubSkillView {
    fn from(doc: &SubSkillDoc) -> Self {
        let (created_at, updated_at) = timestamps(&doc.metadata);
        Self {
            id: hex(doc._id),
            skill_id: doc.skill_id.to_hex(),
            name: doc.name.clone(),
            description: doc.description.clone(),
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeView {
    pub id: String,
    pub sub_skill_id: String,
    pub name: String,
    pub description: String,
    pub xp_reward: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&ChallengeDoc> for ChallengeView {
    fn from(doc: &ChallengeDoc) -> Self {
        let (created_at, updated_at) = timestamps(&doc.metadata);
        Self {
            id: hex(doc._id),
            sub_skill_id: doc.sub_skill_id.to_hex(),
            name: doc.name.clone(),
            description: doc.description.clone(),
            xp_reward: doc.xp_reward,
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    pub id: String,
    pub challenge_id: String,
    pub completed_at: DateTime<Utc>,
    pub notes: String,
    pub xp_awarded: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&AchievementDoc> for AchievementView {
    fn from(doc: &AchievementDoc) -> Self {
        Self {
            id: hex(doc._id),
            challenge_id: doc.challenge_id.to_hex(),
            completed_at: doc.completed_at.to_chrono(),
            notes: doc.notes.clone(),
            xp_awarded: doc.xp_awarded,
            created_at: doc.metadata.created_at.map(|t| t.to_chrono()),
        }
    }
}
