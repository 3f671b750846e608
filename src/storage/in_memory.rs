//! In-memory stores for tests and local development
//!
//! Records live in `RwLock`-guarded maps. Unique fields (tour name, user
//! email) are enforced on every write the same way the MongoDB unique indexes
//! are, and list queries run through the shared JSON evaluator in
//! [`document`](super::document).

use super::document::run_query;
use crate::core::error::{StorageError, StoreResult};
use crate::core::query::{ListQuery, VERSION_FIELD};
use crate::core::service::{TourStore, UserStore};
use crate::entities::tour::{DifficultyStats, MonthlyPlan, Tour};
use crate::entities::user::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

const BACKEND: &str = "in-memory";

fn lock_error(kind: &str, err: impl Display) -> StorageError {
    tracing::error!(error = %err, "failed to acquire {} lock", kind);
    StorageError::Unavailable {
        backend: BACKEND.to_string(),
    }
}

/// Stored form of a record, as the list evaluator sees it
fn stored_document<T: Serialize>(record: &T) -> StoreResult<Value> {
    let mut doc = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut doc {
        map.insert(VERSION_FIELD.to_string(), Value::from(0));
    }
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Tours
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct InMemoryTourStore {
    tours: Arc<RwLock<HashMap<Uuid, Tour>>>,
}

impl InMemoryTourStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique_name(tours: &HashMap<Uuid, Tour>, tour: &Tour) -> StoreResult<()> {
        if tours.values().any(|t| t.id != tour.id && t.name == tour.name) {
            return Err(StorageError::Duplicate {
                field: "name".to_string(),
                value: tour.name.clone(),
            });
        }
        Ok(())
    }

    fn visible(&self) -> StoreResult<Vec<Tour>> {
        let tours = self.tours.read().map_err(|e| lock_error("read", e))?;
        Ok(tours.values().filter(|t| !t.secret_tours).cloned().collect())
    }
}

#[async_trait]
impl TourStore for InMemoryTourStore {
    async fn create(&self, tour: Tour) -> StoreResult<Tour> {
        let mut tours = self.tours.write().map_err(|e| lock_error("write", e))?;
        Self::check_unique_name(&tours, &tour)?;
        tours.insert(tour.id, tour.clone());
        Ok(tour)
    }

    async fn create_many(&self, batch: Vec<Tour>) -> StoreResult<usize> {
        let mut tours = self.tours.write().map_err(|e| lock_error("write", e))?;
        let count = batch.len();
        for tour in batch {
            Self::check_unique_name(&tours, &tour)?;
            tours.insert(tour.id, tour);
        }
        Ok(count)
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Option<Tour>> {
        let tours = self.tours.read().map_err(|e| lock_error("read", e))?;
        Ok(tours.get(id).filter(|t| !t.secret_tours).cloned())
    }

    async fn find(&self, query: &ListQuery) -> StoreResult<Vec<Value>> {
        let docs = self
            .visible()?
            .iter()
            .map(stored_document)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(run_query(docs, query))
    }

    async fn replace(&self, tour: Tour) -> StoreResult<Option<Tour>> {
        let mut tours = self.tours.write().map_err(|e| lock_error("write", e))?;
        if !tours.get(&tour.id).is_some_and(|t| !t.secret_tours) {
            return Ok(None);
        }
        Self::check_unique_name(&tours, &tour)?;
        tours.insert(tour.id, tour.clone());
        Ok(Some(tour))
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let mut tours = self.tours.write().map_err(|e| lock_error("write", e))?;
        if !tours.get(id).is_some_and(|t| !t.secret_tours) {
            return Ok(false);
        }
        tours.remove(id);
        Ok(true)
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        let mut tours = self.tours.write().map_err(|e| lock_error("write", e))?;
        let count = tours.len() as u64;
        tours.clear();
        Ok(count)
    }

    async fn stats(&self) -> StoreResult<Vec<DifficultyStats>> {
        Ok(DifficultyStats::compute(&self.visible()?))
    }

    async fn monthly_plan(&self, year: i32) -> StoreResult<Vec<MonthlyPlan>> {
        Ok(MonthlyPlan::compute(&self.visible()?, year))
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique_email(users: &HashMap<Uuid, User>, user: &User) -> StoreResult<()> {
        if users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(StorageError::Duplicate {
                field: "email".to_string(),
                value: user.email.clone(),
            });
        }
        Ok(())
    }

    fn find_active(&self, predicate: impl Fn(&User) -> bool) -> StoreResult<Option<User>> {
        let users = self.users.read().map_err(|e| lock_error("read", e))?;
        Ok(users.values().find(|u| u.active && predicate(u)).cloned())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().map_err(|e| lock_error("write", e))?;
        Self::check_unique_email(&users, &user)?;
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: &Uuid) -> StoreResult<Option<User>> {
        self.find_active(|u| &u.id == id)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_active(|u| u.email == email)
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        self.find_active(|u| {
            u.password_reset_token.as_deref() == Some(token_hash)
                && u.password_reset_expires.is_some_and(|expires| expires > now)
        })
    }

    async fn find(&self, query: &ListQuery) -> StoreResult<Vec<Value>> {
        let docs = {
            let users = self.users.read().map_err(|e| lock_error("read", e))?;
            users
                .values()
                .filter(|u| u.active)
                .map(stored_document)
                .collect::<StoreResult<Vec<_>>>()?
        };
        Ok(run_query(docs, query))
    }

    async fn save(&self, user: User) -> StoreResult<Option<User>> {
        let mut users = self.users.write().map_err(|e| lock_error("write", e))?;
        if !users.contains_key(&user.id) {
            return Ok(None);
        }
        Self::check_unique_email(&users, &user)?;
        users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let mut users = self.users.write().map_err(|e| lock_error("write", e))?;
        if !users.get(id).is_some_and(|u| u.active) {
            return Ok(false);
        }
        users.remove(id);
        Ok(true)
    }
}
