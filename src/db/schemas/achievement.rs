//! Achievement document schema
//!
//! One record per completion of a challenge. Several achievements may point
//! at the same challenge.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::db::entity::{Entity, Patch};
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for achievements
pub const ACHIEVEMENT_COLLECTION: &str = "achievements";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AchievementDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub profile_id: ObjectId,

    /// Completed challenge
    pub challenge_id: ObjectId,

    pub completed_at: DateTime,

    #[serde(default)]
    pub notes: String,

    /// XP granted to the skill and to the category when this was recorded
    #[serde(default)]
    pub xp_awarded: i64,
}

impl AchievementDoc {
    pub fn new(
        profile_id: ObjectId,
        challenge_id: ObjectId,
        completed_at: DateTime,
        notes: String,
        xp_awarded: i64,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            profile_id,
            challenge_id,
            completed_at,
            notes,
            xp_awarded,
        }
    }
}

/// Editable achievement fields. XP is fixed once awarded.
#[derive(Debug, Clone, Default)]
pub struct AchievementUpdate {
    pub notes: Option<String>,
    pub completed_at: Option<DateTime>,
}

impl Patch<AchievementDoc> for AchievementUpdate {
    fn apply(&self, doc: &mut AchievementDoc) {
        if let Some(ref notes) = self.notes {
            doc.notes = notes.clone();
        }
        if let Some(completed_at) = self.completed_at {
            doc.completed_at = completed_at;
        }
    }

    fn set_document(&self) -> Document {
        let mut set = doc! { "metadata.updated_at": DateTime::now() };
        if let Some(ref notes) = self.notes {
            set.insert("notes", notes);
        }
        if let Some(completed_at) = self.completed_at {
            set.insert("completed_at", completed_at);
        }
        set
    }
}

impl Entity for AchievementDoc {
    const COLLECTION: &'static str = ACHIEVEMENT_COLLECTION;
    const KIND: &'static str = "Achievement";
    const PARENT_FIELD: &'static str = "challenge_id";
    const SORT: (&'static str, i32) = ("completed_at", -1);

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
        self.challenge_id
    }

    /// Most recent completion first
    fn listing_cmp(&self, other: &Self) -> Ordering {
        other
            .completed_at
            .cmp(&self.completed_at)
            .then_with(|| other._id.cmp(&self._id))
    }
}

impl IntoIndexes for AchievementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "profile_id": 1, "completed_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("profile_completed_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "challenge_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("challenge_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AchievementDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
