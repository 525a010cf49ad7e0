//! Persistence for skilltree
//!
//! Document schemas, the `SkillStore` contract and its two backends.

pub mod connection;
pub mod entity;
pub mod memory;
pub mod mongo;
pub mod mongo_store;
pub mod schemas;
pub mod store;

pub use connection::MongoConnection;
pub use entity::{Entity, ListFilter, Patch, XpCarrier};
pub use memory::MemoryStore;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use mongo_store::MongoStore;
pub use store::{
    AwardTarget, DeleteRoot, DeleteSummary, RecordedAchievement, SkillStore, Store,
};
