//! Store traits for tours and users
//!
//! Implementations provide the data access the handlers need; the API is
//! agnostic to the underlying storage mechanism. Visibility rules live in the
//! stores: secret tours are invisible to every tour operation, and
//! deactivated users are invisible to every lookup except [`UserStore::save`].

use crate::core::error::StoreResult;
use crate::core::query::ListQuery;
use crate::entities::tour::{DifficultyStats, MonthlyPlan, Tour};
use crate::entities::user::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

#[async_trait]
pub trait TourStore: Send + Sync {
    /// Insert a new tour; fails with `StorageError::Duplicate` on a name clash
    async fn create(&self, tour: Tour) -> StoreResult<Tour>;

    /// Insert many tours at once (dev-data import)
    async fn create_many(&self, tours: Vec<Tour>) -> StoreResult<usize>;

    /// Get a visible tour by ID
    async fn get(&self, id: &Uuid) -> StoreResult<Option<Tour>>;

    /// Run a list query; documents come back projected
    async fn find(&self, query: &ListQuery) -> StoreResult<Vec<Value>>;

    /// Replace a visible tour, `None` if it does not exist
    async fn replace(&self, tour: Tour) -> StoreResult<Option<Tour>>;

    /// Delete a visible tour, `false` if it does not exist
    async fn delete(&self, id: &Uuid) -> StoreResult<bool>;

    /// Remove every tour, secret ones included
    async fn delete_all(&self) -> StoreResult<u64>;

    /// Per-difficulty statistics over tours rated 4.5 or better
    async fn stats(&self) -> StoreResult<Vec<DifficultyStats>>;

    /// Tour starts per month of `year`, busiest month first
    async fn monthly_plan(&self, year: i32) -> StoreResult<Vec<MonthlyPlan>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user; fails with `StorageError::Duplicate` on an email clash
    async fn create(&self, user: User) -> StoreResult<User>;

    /// Get an active user by ID
    async fn get(&self, id: &Uuid) -> StoreResult<Option<User>>;

    /// Get an active user by (lowercase) email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Get the active user holding this reset-token hash, if it has not expired
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    /// Run a list query over active users; documents come back projected
    async fn find(&self, query: &ListQuery) -> StoreResult<Vec<Value>>;

    /// Replace a user record by ID, `None` if it does not exist
    async fn save(&self, user: User) -> StoreResult<Option<User>>;

    /// Hard delete an active user, `false` if there is none with this ID
    async fn delete(&self, id: &Uuid) -> StoreResult<bool>;
}
