//! MongoDB-backed [`DataStore`].
//!
//! Holds usage counters, cached generations and user profiles.

use super::store::DataStore;
use crate::models::{QuotaKind, StoredContent, UsageRecord, UserProfile};
use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, IndexOptions, ReplaceOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MedaiDb {
    db: Database,
}

impl MedaiDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for medai-service");

        // One counter per user, kind and period; also backs the atomic consume
        create_index(
            &self.usage(),
            doc! { "user_id": 1, "kind": 1, "period": 1 },
            "usage_user_kind_period_idx",
            true,
        )
        .await?;

        create_index(
            &self.content(),
            doc! { "identity_key": 1 },
            "content_identity_key_idx",
            true,
        )
        .await?;

        create_index(&self.content(), doc! { "node_id": 1 }, "content_node_id_idx", false).await?;

        create_index(
            &self.profiles(),
            doc! { "user_id": 1 },
            "profile_user_id_idx",
            true,
        )
        .await?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    fn usage(&self) -> Collection<UsageRecord> {
        self.db.collection("ai_usage")
    }

    fn content(&self) -> Collection<StoredContent> {
        self.db.collection("generated_content")
    }

    fn profiles(&self) -> Collection<UserProfile> {
        self.db.collection("profiles")
    }

    /// Drop the whole database; used to clean up throwaway test databases.
    pub async fn drop_database(&self) -> Result<(), AppError> {
        self.db
            .drop(None)
            .await
            .map_err(|e| db_error("drop_database", e))
    }

    /// One conditional upsert of the usage counter.
    async fn try_increment(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
        limit: i64,
    ) -> Result<Option<UsageRecord>, mongodb::error::Error> {
        // Matches only while below the ceiling. When nothing matches the upsert
        // inserts, which collides with the unique index if the record exists.
        let filter = doc! {
            "user_id": user_id,
            "kind": kind.as_str(),
            "period": period,
            "count": { "$lt": limit },
        };
        let update = doc! {
            "$inc": { "count": 1_i64 },
            "$set": { "limit": limit, "updated_at": Utc::now().timestamp_millis() },
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        self.usage()
            .find_one_and_update(filter, update, options)
            .await
    }
}

async fn create_index<T: Send + Sync>(
    collection: &Collection<T>,
    keys: mongodb::bson::Document,
    name: &str,
    unique: bool,
) -> Result<(), AppError> {
    let index = IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(unique)
                .build(),
        )
        .build();

    collection.create_index(index, None).await.map_err(|e| {
        tracing::error!("Failed to create {} index: {}", name, e);
        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
    })?;
    Ok(())
}

fn db_error(operation: &str, e: mongodb::error::Error) -> AppError {
    tracing::error!(operation, "MongoDB operation failed: {}", e);
    AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Command(err) => err.code == DUPLICATE_KEY,
        ErrorKind::Write(WriteFailure::WriteError(err)) => err.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[async_trait]
impl DataStore for MedaiDb {
    async fn get_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
    ) -> Result<Option<UsageRecord>, AppError> {
        self.usage()
            .find_one(
                doc! { "user_id": user_id, "kind": kind.as_str(), "period": period },
                None,
            )
            .await
            .map_err(|e| db_error("get_usage", e))
    }

    async fn increment_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
        limit: i64,
    ) -> Result<Option<UsageRecord>, AppError> {
        if limit <= 0 {
            return Ok(None);
        }

        match self.try_increment(user_id, kind, period, limit).await {
            Ok(record) => return Ok(record),
            Err(e) if is_duplicate_key(&e) => {}
            Err(e) => return Err(db_error("increment_usage", e)),
        }

        // E11000 means the record exists: either it is full, or a concurrent
        // first consume of the period inserted it first. A second attempt now
        // updates in place, so a duplicate key here can only mean full.
        tracing::debug!(user_id, kind = %kind, period, "Usage upsert collided, retrying");
        match self.try_increment(user_id, kind, period, limit).await {
            Ok(record) => Ok(record),
            Err(e) if is_duplicate_key(&e) => Ok(None),
            Err(e) => Err(db_error("increment_usage", e)),
        }
    }

    async fn refund_usage(
        &self,
        user_id: &str,
        kind: QuotaKind,
        period: &str,
    ) -> Result<(), AppError> {
        self.usage()
            .update_one(
                doc! {
                    "user_id": user_id,
                    "kind": kind.as_str(),
                    "period": period,
                    "count": { "$gt": 0_i64 },
                },
                doc! {
                    "$inc": { "count": -1_i64 },
                    "$set": { "updated_at": Utc::now().timestamp_millis() },
                },
                None,
            )
            .await
            .map_err(|e| db_error("refund_usage", e))?;
        Ok(())
    }

    async fn get_content(&self, identity_key: &str) -> Result<Option<StoredContent>, AppError> {
        self.content()
            .find_one(doc! { "identity_key": identity_key }, None)
            .await
            .map_err(|e| db_error("get_content", e))
    }

    async fn put_content(&self, content: &StoredContent) -> Result<(), AppError> {
        self.content()
            .replace_one(
                doc! { "identity_key": content.identity_key.as_str() },
                content,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| db_error("put_content", e))?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.profiles()
            .find_one(doc! { "user_id": user_id }, None)
            .await
            .map_err(|e| db_error("get_profile", e))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        self.profiles()
            .replace_one(
                doc! { "user_id": profile.user_id.as_str() },
                profile,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| db_error("upsert_profile", e))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| db_error("ping", e))?;
        Ok(())
    }
}
