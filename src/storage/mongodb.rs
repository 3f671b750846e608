//! MongoDB stores using the official async driver
//!
//! Tours and users each get a collection (`tours`, `users`). Records are
//! serialized through `serde_json::Value` and converted to BSON with `id`
//! mapped to `_id`; UUIDs are stored as strings and timestamps as RFC 3339
//! strings with millisecond precision, so range filters and sorts on dates
//! compare lexicographically.
//!
//! Visibility rules are pushed into every filter: secret tours and
//! deactivated users never match.

use super::document::{
    document_to_json, document_to_record, mongo_filter, mongo_projection, mongo_sort,
    record_to_document,
};
use crate::config::DatabaseConfig;
use crate::core::error::{StorageError, StoreResult};
use crate::core::query::ListQuery;
use crate::core::service::{TourStore, UserStore};
use crate::core::timestamp;
use crate::entities::tour::{DifficultyStats, MonthlyPlan, STATS_MIN_RATING, Tour};
use crate::entities::user::User;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

const BACKEND: &str = "mongodb";

/// Server error code of a unique index violation
const DUPLICATE_KEY: i32 = 11000;

/// Connect, select the configured database and check it answers
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Database> {
    let client = Client::with_uri_str(&config.uri)
        .await
        .context("invalid MongoDB connection string")?;
    let database = client
        .default_database()
        .unwrap_or_else(|| client.database(&config.name));
    database
        .run_command(doc! { "ping": 1 })
        .await
        .context("MongoDB did not answer ping")?;
    tracing::info!(database = %database.name(), "DB connection successful!");
    Ok(database)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn uuid_bson(id: &Uuid) -> Bson {
    Bson::String(id.to_string())
}

fn query_error(context: &str, err: mongodb::error::Error) -> StorageError {
    StorageError::QueryError {
        backend: BACKEND.to_string(),
        message: format!("{}: {}", context, err),
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|w| w.code == DUPLICATE_KEY)),
        _ => false,
    }
}

/// Map a write failure, turning unique index violations into `Duplicate`
fn write_error(context: &str, field: &str, value: &str, err: mongodb::error::Error) -> StorageError {
    if is_duplicate_key(&err) {
        StorageError::Duplicate {
            field: field.to_string(),
            value: value.to_string(),
        }
    } else {
        query_error(context, err)
    }
}

async fn find_documents(
    collection: &Collection<Document>,
    query: &ListQuery,
    base: Document,
) -> StoreResult<Vec<Value>> {
    let filter = mongo_filter(&query.filters, base)?;
    let mut find = collection
        .find(filter)
        .sort(mongo_sort(&query.sort))
        .skip(query.skip);
    if let Some(limit) = query.limit {
        find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    if let Some(projection) = mongo_projection(&query.projection) {
        find = find.projection(projection);
    }

    let docs: Vec<Document> = find
        .await
        .map_err(|e| query_error("failed to run list query", e))?
        .try_collect()
        .await
        .map_err(|e| query_error("failed to collect list query", e))?;

    Ok(docs.into_iter().map(document_to_json).collect())
}

async fn aggregate<T: DeserializeOwned>(
    collection: &Collection<Document>,
    pipeline: Vec<Document>,
) -> StoreResult<Vec<T>> {
    let docs: Vec<Document> = collection
        .aggregate(pipeline)
        .await
        .map_err(|e| query_error("failed to run aggregation", e))?
        .try_collect()
        .await
        .map_err(|e| query_error("failed to collect aggregation", e))?;

    docs.into_iter().map(document_to_record).collect()
}

// ---------------------------------------------------------------------------
// Tours
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct MongoTourStore {
    database: Database,
}

impl MongoTourStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self) -> Collection<Document> {
        self.database.collection("tours")
    }

    /// Visibility clause shared by every tour operation
    fn visible() -> Document {
        doc! { "secretTours": { "$ne": true } }
    }

    fn visible_id(id: &Uuid) -> Document {
        let mut filter = Self::visible();
        filter.insert("_id", uuid_bson(id));
        filter
    }

    /// Unique tour names; idempotent, safe on every startup
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection()
            .create_index(index)
            .await
            .map_err(|e| query_error("failed to create tour indexes", e))?;
        Ok(())
    }
}

#[async_trait]
impl TourStore for MongoTourStore {
    async fn create(&self, tour: Tour) -> StoreResult<Tour> {
        let doc = record_to_document(&tour)?;
        self.collection()
            .insert_one(doc)
            .await
            .map_err(|e| write_error("failed to create tour", "name", &tour.name, e))?;
        Ok(tour)
    }

    async fn create_many(&self, tours: Vec<Tour>) -> StoreResult<usize> {
        if tours.is_empty() {
            return Ok(0);
        }
        let docs = tours
            .iter()
            .map(record_to_document)
            .collect::<StoreResult<Vec<_>>>()?;
        let result = self.collection().insert_many(docs).await.map_err(|e| {
            let names: Vec<&str> = tours.iter().map(|t| t.name.as_str()).collect();
            write_error("failed to import tours", "name", &names.join(", "), e)
        })?;
        Ok(result.inserted_ids.len())
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Option<Tour>> {
        self.collection()
            .find_one(Self::visible_id(id))
            .await
            .map_err(|e| query_error("failed to get tour", e))?
            .map(document_to_record)
            .transpose()
    }

    async fn find(&self, query: &ListQuery) -> StoreResult<Vec<Value>> {
        find_documents(&self.collection(), query, Self::visible()).await
    }

    async fn replace(&self, tour: Tour) -> StoreResult<Option<Tour>> {
        let doc = record_to_document(&tour)?;
        let result = self
            .collection()
            .replace_one(Self::visible_id(&tour.id), doc)
            .await
            .map_err(|e| write_error("failed to update tour", "name", &tour.name, e))?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        Ok(Some(tour))
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let result = self
            .collection()
            .delete_one(Self::visible_id(id))
            .await
            .map_err(|e| query_error("failed to delete tour", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        let result = self
            .collection()
            .delete_many(doc! {})
            .await
            .map_err(|e| query_error("failed to delete tours", e))?;
        Ok(result.deleted_count)
    }

    async fn stats(&self) -> StoreResult<Vec<DifficultyStats>> {
        let mut matched = Self::visible();
        matched.insert("ratingsAverage", doc! { "$gte": STATS_MIN_RATING });

        let pipeline = vec![
            doc! { "$match": matched },
            doc! {
                "$group": {
                    "_id": "$difficulty",
                    "numTours": { "$sum": 1 },
                    "numRatings": { "$sum": "$ratingsQuantity" },
                    "avgRating": { "$avg": "$ratingsAverage" },
                    "avgPrice": { "$avg": "$price" },
                    "minPrice": { "$min": "$price" },
                    "maxPrice": { "$max": "$price" },
                }
            },
            doc! {
                "$project": {
                    "_id": 0,
                    "difficulty": "$_id",
                    "numTours": 1,
                    "numRatings": 1,
                    "avgRating": 1,
                    "avgPrice": 1,
                    "minPrice": 1,
                    "maxPrice": 1,
                }
            },
            doc! { "$sort": { "avgPrice": 1, "difficulty": 1 } },
        ];

        aggregate(&self.collection(), pipeline).await
    }

    async fn monthly_plan(&self, year: i32) -> StoreResult<Vec<MonthlyPlan>> {
        let Some((start, end)) = MonthlyPlan::year_bounds(year) else {
            return Ok(Vec::new());
        };

        let pipeline = vec![
            doc! { "$match": Self::visible() },
            doc! { "$unwind": "$startDates" },
            doc! {
                "$match": {
                    "startDates": {
                        "$gte": timestamp::format(&start),
                        "$lt": timestamp::format(&end),
                    }
                }
            },
            doc! {
                "$group": {
                    "_id": { "$month": { "$toDate": "$startDates" } },
                    "numTourStarts": { "$sum": 1 },
                    "tours": { "$push": "$name" },
                }
            },
            doc! { "$addFields": { "month": "$_id" } },
            doc! { "$project": { "_id": 0 } },
            doc! { "$sort": { "numTourStarts": -1, "month": 1 } },
            doc! { "$limit": MonthlyPlan::MAX_MONTHS as i64 },
        ];

        aggregate(&self.collection(), pipeline).await
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct MongoUserStore {
    database: Database,
}

impl MongoUserStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self) -> Collection<Document> {
        self.database.collection("users")
    }

    /// Visibility clause: soft-deleted users never match
    fn active() -> Document {
        doc! { "active": { "$ne": false } }
    }

    fn with_active(mut filter: Document) -> Document {
        filter.insert("active", doc! { "$ne": false });
        filter
    }

    async fn find_active(&self, filter: Document) -> StoreResult<Option<User>> {
        let filter = Self::with_active(filter);
        self.collection()
            .find_one(filter)
            .await
            .map_err(|e| query_error("failed to get user", e))?
            .map(document_to_record)
            .transpose()
    }

    /// Unique emails; idempotent, safe on every startup
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection()
            .create_index(index)
            .await
            .map_err(|e| query_error("failed to create user indexes", e))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        let doc = record_to_document(&user)?;
        self.collection()
            .insert_one(doc)
            .await
            .map_err(|e| write_error("failed to create user", "email", &user.email, e))?;
        Ok(user)
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Option<User>> {
        self.find_active(doc! { "_id": uuid_bson(id) }).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_active(doc! { "email": email }).await
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        self.find_active(doc! {
            "passwordResetToken": token_hash,
            "passwordResetExpires": { "$gt": timestamp::format(&now) },
        })
        .await
    }

    async fn find(&self, query: &ListQuery) -> StoreResult<Vec<Value>> {
        find_documents(&self.collection(), query, Self::active()).await
    }

    async fn save(&self, user: User) -> StoreResult<Option<User>> {
        let doc = record_to_document(&user)?;
        let result = self
            .collection()
            .replace_one(doc! { "_id": uuid_bson(&user.id) }, doc)
            .await
            .map_err(|e| write_error("failed to save user", "email", &user.email, e))?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        Ok(Some(user))
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let filter = Self::with_active(doc! { "_id": uuid_bson(id) });
        let result = self
            .collection()
            .delete_one(filter)
            .await
            .map_err(|e| query_error("failed to delete user", e))?;
        Ok(result.deleted_count > 0)
    }
}
