//! SubSkill document schema
//!
//! Purely organizational: groups challenges under a skill, carries no XP.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::db::entity::{cmp_by_name, Entity, Patch};
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for sub-skills
pub const SUB_SKILL_COLLECTION: &str = "sub_skills";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SubSkillDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub profile_id: ObjectId,

    /// Parent skill
    pub skill_id: ObjectId,

    pub name: String,

    #[serde(default)]
    pub description: String,
}

impl SubSkillDoc {
    pub fn new(profile_id: ObjectId, skill_id: ObjectId, name: String, description: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            profile_id,
            skill_id,
            name,
            description,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubSkillUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Patch<SubSkillDoc> for SubSkillUpdate {
    fn apply(&self, doc: &mut SubSkillDoc) {
        if let Some(ref name) = self.name {
            doc.name = name.clone();
        }
        if let Some(ref description) = self.description {
            doc.description = description.clone();
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
        set
    }
}

impl Entity for SubSkillDoc {
    const COLLECTION: &'static str = SUB_SKILL_COLLECTION;
    const KIND: &'static str = "SubSkill";
    const PARENT_FIELD: &'static str = "skill_id";

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
        self.skill_id
    }

    fn listing_cmp(&self, other: &Self) -> Ordering {
        cmp_by_name(&self.name, self._id, &other.name, other._id)
    }
}

impl IntoIndexes for SubSkillDoc {
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
                doc! { "skill_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("skill_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SubSkillDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
