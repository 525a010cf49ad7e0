//! MongoDB client and collection wrapper
//!
//! Typed collections exclude soft-deleted documents from every read and can
//! optionally run each operation inside a client session (transaction).

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::StreamExt;
use mongodb::{
    options::{IndexOptions, ReturnDocument, UpdateModifications},
    Client, ClientSession, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

use crate::db::schemas::Metadata;
use crate::types::SkillTreeError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone, Debug)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the deployment answers a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, SkillTreeError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| SkillTreeError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| SkillTreeError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub fn collection<T>(&self, name: &str) -> MongoCollection<T>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name)
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Typed MongoDB collection
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

/// Add the soft-delete exclusion to a filter
fn live(filter: Document) -> Document {
    let mut full_filter = filter;
    full_filter.insert("metadata.is_deleted", doc! { "$ne": true });
    full_filter
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    pub fn new(client: &Client, db_name: &str, collection_name: &str) -> Self {
        let collection = client.database(db_name).collection::<T>(collection_name);
        MongoCollection { inner: collection }
    }

    /// Apply schema-defined indexes
    pub async fn apply_indexes(&self) -> Result<(), SkillTreeError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| SkillTreeError::database("Failed to create indexes", e))?;

        debug!(collection = %self.inner.name(), "Indexes applied");
        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(
        &self,
        mut item: T,
        session: Option<&mut ClientSession>,
    ) -> Result<ObjectId, SkillTreeError> {
        item.mut_metadata().stamp_created();

        let action = self.inner.insert_one(item);
        let result = match session {
            Some(s) => action.session(s).await,
            None => action.await,
        }
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("E11000") || message.contains("duplicate key") {
                SkillTreeError::Conflict(format!("Duplicate key: {}", message))
            } else {
                SkillTreeError::database("Insert failed", e)
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| SkillTreeError::Database("Failed to get inserted ID".into()))
    }

    /// Find one live document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, SkillTreeError> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| SkillTreeError::database("Find failed", e))
    }

    /// Find live documents by filter in the given order
    pub async fn find_many(&self, filter: Document, sort: Document) -> Result<Vec<T>, SkillTreeError> {
        let cursor = self
            .inner
            .find(live(filter))
            .sort(sort)
            .await
            .map_err(|e| SkillTreeError::database("Find failed", e))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Atomically modify one live document and return it as it was before or after
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        return_document: ReturnDocument,
        session: Option<&mut ClientSession>,
    ) -> Result<Option<T>, SkillTreeError> {
        let action = self
            .inner
            .find_one_and_update(live(filter), update)
            .return_document(return_document);

        match session {
            Some(s) => action.session(s).await,
            None => action.await,
        }
        .map_err(|e| SkillTreeError::database("Update failed", e))
    }

    /// Bump `updated_at` on one live document inside the session and return
    /// it. The write makes a concurrent delete of the same document conflict
    /// with the transaction instead of slipping past a plain read.
    pub async fn lock_one(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<Option<T>, SkillTreeError> {
        self.find_one_and_update(
            filter,
            doc! { "$set": { "metadata.updated_at": DateTime::now() } },
            ReturnDocument::After,
            Some(session),
        )
        .await
    }

    /// Ids of live documents matching a filter, read inside the session
    pub async fn ids_matching(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<Vec<ObjectId>, SkillTreeError> {
        let raw = self.inner.clone_with_type::<Document>();
        let mut cursor = raw
            .find(live(filter))
            .projection(doc! { "_id": 1 })
            .session(&mut *session)
            .await
            .map_err(|e| SkillTreeError::database("Find failed", e))?;

        let mut ids = Vec::new();
        while let Some(doc) = cursor.next(&mut *session).await {
            let doc = doc.map_err(|e| SkillTreeError::database("Cursor failed", e))?;
            if let Ok(id) = doc.get_object_id("_id") {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Soft delete every live document whose `_id` is in `ids`
    pub async fn soft_delete_ids(
        &self,
        ids: &[ObjectId],
        session: &mut ClientSession,
    ) -> Result<u64, SkillTreeError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = DateTime::now();
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": now,
                "metadata.updated_at": now,
            }
        };

        let result = self
            .inner
            .update_many(live(doc! { "_id": { "$in": ids.to_vec() } }), update)
            .session(&mut *session)
            .await
            .map_err(|e| SkillTreeError::database("Delete failed", e))?;

        Ok(result.modified_count)
    }
}
