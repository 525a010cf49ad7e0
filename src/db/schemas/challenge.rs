//! Challenge document schema
//!
//! A challenge always hangs off a sub-skill. Completing it records an
//! achievement worth `xp_reward`.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::db::entity::{cmp_by_name, Entity, Patch};
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for challenges
pub const CHALLENGE_COLLECTION: &str = "challenges";

/// Reward used when a challenge is created without one
pub const DEFAULT_XP_REWARD: i64 = 10;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChallengeDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub profile_id: ObjectId,

    /// Parent sub-skill
    pub sub_skill_id: ObjectId,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// XP awarded per completion, at least 1
    #[serde(default = "default_xp_reward")]
    pub xp_reward: i64,
}

fn default_xp_reward() -> i64 {
    DEFAULT_XP_REWARD
}

impl ChallengeDoc {
    pub fn new(
        profile_id: ObjectId,
        sub_skill_id: ObjectId,
        name: String,
        description: String,
        xp_reward: i64,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            profile_id,
            sub_skill_id,
            name,
            description,
            xp_reward,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChallengeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub xp_reward: Option<i64>,
    pub sub_skill_id: Option<ObjectId>,
}

impl Patch<ChallengeDoc> for ChallengeUpdate {
    fn apply(&self, doc: &mut ChallengeDoc) {
        if let Some(ref name) = self.name {
            doc.name = name.clone();
        }
        if let Some(ref description) = self.description {
            doc.description = description.clone();
        }
        if let Some(xp_reward) = self.xp_reward {
            doc.xp_reward = xp_reward;
        }
        if let Some(sub_skill_id) = self.sub_skill_id {
            doc.sub_skill_id = sub_skill_id;
        }
    }

    fn set_document(&self) -> Document {
        let mut set = doc! { "metadata.updated_at": DateTime::now() };
        if let Some(ref name) = self.name {
            set.insert("name", name);
        }
        if let Some(ref description) = self.description {
            set.insert("description", description);
        }
        if let Some(xp_reward) = self.xp_reward {
            set.insert("xp_reward", xp_reward);
        }
        if let Some(sub_skill_id) = self.sub_skill_id {
            set.insert("sub_skill_id", sub_skill_id);
        }
        set
    }
}

impl Entity for ChallengeDoc {
    const COLLECTION: &'static str = CHALLENGE_COLLECTION;
    const KIND: &'static str = "Challenge";
    const PARENT_FIELD: &'static str = "sub_skill_id";

    fn id(&self) -> Option<ObjectId> {
        self._id
    }

    fn set_id(&mut self, id: ObjectId) {
        self._id = Some(id);
    }

    fn profile_id(&self) -> ObjectId {
        self.profile_id
    }

    fn parent_id(&self) -> ObjectId {
        self.sub_skill_id
    }

    fn listing_cmp(&self, other: &Self) -> Ordering {
        cmp_by_name(&self.name, self._id, &other.name, other._id)
    }
}

impl IntoIndexes for ChallengeDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "profile_id": 1, "name": 1 },
                Some(
                    IndexOptions::builder()
                        .name("profile_name_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "sub_skill_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("sub_skill_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ChallengeDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
