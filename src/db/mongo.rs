//! MongoDB client and collection wrapper

use bson::{doc, DateTime, Document};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::BrainError;

/// Server error code for a unique index violation
const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Whether the error is a unique index violation
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, BrainError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast when MongoDB is unreachable so dev mode can fall back
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| BrainError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BrainError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, creating its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, BrainError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
///
/// Documents are keyed by a natural string `_id`; reads skip soft-deleted
/// documents.
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, BrainError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), BrainError> {
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
            .map_err(|e| BrainError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps.
    /// A unique index violation is reported as `Conflict`.
    pub async fn insert_one(&self, mut item: T) -> Result<(), BrainError> {
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        self.inner.insert_one(item).await.map_err(|e| {
            if is_duplicate_key(&e) {
                BrainError::Conflict("Document already exists".into())
            } else {
                BrainError::Database(format!("Insert failed: {}", e))
            }
        })?;

        Ok(())
    }

    /// Find one live document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, BrainError> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .find_one(full_filter)
            .await
            .map_err(|e| BrainError::Database(format!("Find failed: {}", e)))
    }

    /// Find every live document matching the filter
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, BrainError> {
        self.find_with(filter, None).await
    }

    /// Find live documents in `sort` order, at most `limit` of them
    pub async fn find_sorted(
        &self,
        filter: Document,
        sort: Document,
        limit: i64,
    ) -> Result<Vec<T>, BrainError> {
        let options = FindOptions::builder().sort(sort).limit(limit).build();
        self.find_with(filter, Some(options)).await
    }

    async fn find_with(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, BrainError> {
        use futures_util::StreamExt;

        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let cursor = self
            .inner
            .find(full_filter)
            .with_options(options)
            .await
            .map_err(|e| BrainError::Database(format!("Find failed: {}", e)))?;

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

    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, BrainError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    BrainError::Conflict("Document already exists".into())
                } else {
                    BrainError::Database(format!("Update failed: {}", e))
                }
            })
    }

    /// Update-or-insert. Used with `$setOnInsert` for create-if-absent edges.
    pub async fn upsert_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<(), BrainError> {
        let result = self
            .inner
            .update_one(filter, update.into())
            .upsert(true)
            .await;

        match result {
            Ok(_) => Ok(()),
            // Two concurrent upserts of the same _id: the loser saw the winner's insert
            Err(e) if is_duplicate_key(&e) => Ok(()),
            Err(e) => Err(BrainError::Database(format!("Upsert failed: {}", e))),
        }
    }

    /// Replace a live document; returns whether one matched
    pub async fn replace_one(&self, filter: Document, mut item: T) -> Result<bool, BrainError> {
        item.mut_metadata().updated_at = Some(DateTime::now());

        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let result = self
            .inner
            .replace_one(full_filter, item)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    BrainError::Conflict("Document already exists".into())
                } else {
                    BrainError::Database(format!("Replace failed: {}", e))
                }
            })?;

        Ok(result.matched_count > 0)
    }

    /// Soft delete a live document
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, BrainError> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": DateTime::now(),
                "metadata.updated_at": DateTime::now(),
            }
        };

        self.update_one(full_filter, update).await
    }

    /// Hard delete every matching document; returns the count
    pub async fn delete_many(&self, filter: Document) -> Result<u64, BrainError> {
        let result = self
            .inner
            .delete_many(filter)
            .await
            .map_err(|e| BrainError::Database(format!("Delete failed: {}", e)))?;
        Ok(result.deleted_count)
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}
