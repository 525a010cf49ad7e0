//! Shape shared by every profile-scoped document
//!
//! Categories, skills, sub-skills, challenges and achievements all belong to
//! one profile and hang off one parent reference. Stores use this trait to
//! filter, order and patch them without per-type code.

use bson::{doc, oid::ObjectId, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::cmp::Ordering;
use std::fmt::Debug;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::leveling::XpPool;

/// A profile-scoped document stored in its own collection
pub trait Entity:
    Serialize + DeserializeOwned + Clone + Debug + Unpin + Send + Sync + IntoIndexes + MutMetadata + 'static
{
    /// Collection name
    const COLLECTION: &'static str;
    /// Human-readable kind, used in error messages
    const KIND: &'static str;
    /// Field holding the parent reference
    const PARENT_FIELD: &'static str;
    /// Listing order as (field, direction)
    const SORT: (&'static str, i32) = ("name", 1);

    fn id(&self) -> Option<ObjectId>;
    fn set_id(&mut self, id: ObjectId);
    fn profile_id(&self) -> ObjectId;
    fn parent_id(&self) -> ObjectId;

    /// In-process equivalent of `SORT`
    fn listing_cmp(&self, other: &Self) -> Ordering;
}

/// Partial update of an entity's mutable fields
pub trait Patch<T>: Send + Sync {
    /// Apply the patch to an in-memory document
    fn apply(&self, doc: &mut T);

    /// Fields for a MongoDB `$set`
    fn set_document(&self) -> Document;
}

/// Name ordering with the id as tie-breaker so listings are stable
pub fn cmp_by_name(
    a_name: &str,
    a_id: Option<ObjectId>,
    b_name: &str,
    b_id: Option<ObjectId>,
) -> Ordering {
    a_name.cmp(b_name).then_with(|| a_id.cmp(&b_id))
}

/// Owner and optional parent restriction for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFilter {
    pub profile_id: ObjectId,
    pub parent_id: Option<ObjectId>,
}

impl ListFilter {
    pub fn owned_by(profile_id: ObjectId) -> Self {
        Self {
            profile_id,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: Option<ObjectId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn matches<T: Entity>(&self, doc: &T) -> bool {
        doc.profile_id() == self.profile_id
            && self.parent_id.map_or(true, |parent| doc.parent_id() == parent)
    }

    pub fn to_document<T: Entity>(&self) -> Document {
        let mut filter = doc! { "profile_id": self.profile_id };
        if let Some(parent) = self.parent_id {
            filter.insert(T::PARENT_FIELD, parent);
        }
        filter
    }
}

/// An entity that owns an XP pool
pub trait XpCarrier: Entity {
    const POOL: XpPool;

    fn xp(&self) -> i64;

    /// Set xp and rederive level in one step
    fn set_xp(&mut self, xp: i64);
}
