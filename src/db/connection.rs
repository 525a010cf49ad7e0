//! Lazily established MongoDB connection
//!
//! The handle is created at startup without touching the network. The first
//! caller of `ensure_connected` connects and applies indexes; concurrent first
//! callers wait on the same attempt. A failed attempt is not cached, so the
//! next request retries. After `shutdown` the handle refuses new work.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::info;

use crate::db::mongo::MongoClient;
use crate::db::schemas::{
    AchievementDoc, CategoryDoc, ChallengeDoc, ProfileDoc, SkillDoc, SubSkillDoc,
    ACHIEVEMENT_COLLECTION, CATEGORY_COLLECTION, CHALLENGE_COLLECTION, PROFILE_COLLECTION,
    SKILL_COLLECTION, SUB_SKILL_COLLECTION,
};
use crate::types::{Result, SkillTreeError};

pub struct MongoConnection {
    uri: String,
    db_name: String,
    client: OnceCell<MongoClient>,
    closed: AtomicBool,
}

impl MongoConnection {
    /// Create an unconnected handle
    pub fn new(uri: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            db_name: db_name.into(),
            client: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Connect on first use and return the shared client
    pub async fn ensure_connected(&self) -> Result<&MongoClient> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SkillTreeError::Database(
                "MongoDB connection has been shut down".into(),
            ));
        }

        self.client
            .get_or_try_init(|| async {
                let client = MongoClient::new(&self.uri, &self.db_name).await?;
                apply_all_indexes(&client).await?;
                Ok::<_, SkillTreeError>(client)
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.client.initialized() && !self.closed.load(Ordering::Acquire)
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Close the client. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.client.get() {
            Some(client) => {
                client.inner().clone().shutdown().await;
                info!("MongoDB connection closed");
            }
            None => info!("MongoDB was never connected, nothing to close"),
        }
    }
}

async fn apply_all_indexes(client: &MongoClient) -> Result<()> {
    client
        .collection::<ProfileDoc>(PROFILE_COLLECTION)
        .apply_indexes()
        .await?;
    client
        .collection::<CategoryDoc>(CATEGORY_COLLECTION)
        .apply_indexes()
        .await?;
    client
        .collection::<SkillDoc>(SKILL_COLLECTION)
        .apply_indexes()
        .await?;
    client
        .collection::<SubSkillDoc>(SUB_SKILL_COLLECTION)
        .apply_indexes()
        .await?;
    client
        .collection::<ChallengeDoc>(CHALLENGE_COLLECTION)
        .apply_indexes()
        .await?;
    client
        .collection::<AchievementDoc>(ACHIEVEMENT_COLLECTION)
        .apply_indexes()
        .await?;
    Ok(())
}
