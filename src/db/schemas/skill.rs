//! Skill document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::category::default_level;
use crate::db::entity::{cmp_by_name, Entity, Patch, XpCarrier};
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::leveling::XpPool;

/// Collection name for skills
pub const SKILL_COLLECTION: &str = "skills";

/// Skill document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SkillDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub profile_id: ObjectId,

    /// Parent category
    pub category_id: ObjectId,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub xp: i64,

    #[serde(default = "default_level")]
    pub level: i64,
}

impl SkillDoc {
    pub fn new(
        profile_id: ObjectId,
        category_id: ObjectId,
        name: String,
        description: String,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            profile_id,
            category_id,
            name,
            description,
            xp: 0,
            level: XpPool::Skill.level(0),
        }
    }
}

/// Mutable skill fields. Moving to another category keeps the skill's XP;
/// XP already rolled up into the old category stays there.
#[derive(Debug, Clone, Default)]
pub struct SkillUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<ObjectId>,
}

impl Patch<SkillDoc> for SkillUpdate {
    fn apply(&self, doc: &mut SkillDoc) {
        if let Some(ref name) = self.name {
            doc.name = name.clone();
        }
        if let Some(ref description) = self.description {
            doc.description = description.clone();
        }
        if let Some(category_id) = self.category_id {
            doc.category_id = category_id;
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
        if let Some(category_id) = self.category_id {
            set.insert("category_id", category_id);
        }
        set
    }
}

impl Entity for SkillDoc {
    const COLLECTION: &'static str = SKILL_COLLECTION;
    const KIND: &'static str = "Skill";
    const PARENT_FIELD: &'static str = "category_id";

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
        self.category_id
    }

    fn listing_cmp(&self, other: &Self) -> Ordering {
        cmp_by_name(&self.name, self._id, &other.name, other._id)
    }
}

impl IntoIndexes for SkillDoc {
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
                doc! { "category_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("category_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SkillDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl XpCarrier for SkillDoc {
    const POOL: XpPool = XpPool::Skill;

    fn xp(&self) -> i64 {
        self.xp
    }

    fn set_xp(&mut self, xp: i64) {
        self.xp = xp;
        self.level = Self::POOL.level(xp);
    }
}
