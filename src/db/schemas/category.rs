//! Category document schema
//!
//! Top of the hierarchy. Owns an independent XP pool that levels at
//! `CATEGORY_XP_PER_LEVEL`.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::db::entity::{cmp_by_name, Entity, Patch, XpCarrier};
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::leveling::XpPool;

/// Collection name for categories
pub const CATEGORY_COLLECTION: &str = "categories";

/// Category document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CategoryDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Owning profile
    pub profile_id: ObjectId,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Accumulated XP, never negative
    #[serde(default)]
    pub xp: i64,

    /// Derived from `xp`; rewritten with every XP change
    #[serde(default = "default_level")]
    pub level: i64,
}

pub(crate) fn default_level() -> i64 {
    1
}

impl CategoryDoc {
    pub fn new(profile_id: ObjectId, name: String, description: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            profile_id,
            name,
            description,
            xp: 0,
            level: XpPool::Category.level(0),
        }
    }
}

/// Mutable category fields
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Patch<CategoryDoc> for CategoryUpdate {
    fn apply(&self, doc: &mut CategoryDoc) {
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

impl Entity for CategoryDoc {
    const COLLECTION: &'static str = CATEGORY_COLLECTION;
    const KIND: &'static str = "Category";
    const PARENT_FIELD: &'static str = "profile_id";

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
        self.profile_id
    }

    fn listing_cmp(&self, other: &Self) -> Ordering {
        cmp_by_name(&self.name, self._id, &other.name, other._id)
    }
}

impl IntoIndexes for CategoryDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "profile_id": 1, "name": 1 },
            Some(
                IndexOptions::builder()
                    .name("profile_name_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CategoryDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl XpCarrier for CategoryDoc {
    const POOL: XpPool = XpPool::Category;

    fn xp(&self) -> i64 {
        self.xp
    }

    fn set_xp(&mut self, xp: i64) {
        self.xp = xp;
        self.level = Self::POOL.level(xp);
    }
}
