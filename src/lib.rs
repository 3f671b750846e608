//! # Natours
//!
//! A tour-booking REST API backed by MongoDB.
//!
//! ## Features
//!
//! - **Tours**: CRUD with validation, slugs and a `durationWeeks` virtual
//! - **Query features**: filtering (`price[gte]=500`), sorting, field selection and pagination
//! - **Aggregates**: statistics by difficulty and a monthly start-date plan
//! - **Accounts**: signup, login, JWT sessions (bearer header or cookie), role restrictions
//! - **Password reset**: single-use emailed tokens valid for ten minutes
//! - **Error envelope**: operational errors verbatim, programming errors hidden in production
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use natours::prelude::*;
//!
//! let config = AppConfig::from_env()?;
//! let db = natours::storage::mongodb::connect(&config.database).await?;
//!
//! ServerBuilder::new(config)
//!     .with_tour_store(MongoTourStore::new(db.clone()))
//!     .with_user_store(MongoUserStore::new(db))
//!     .serve()
//!     .await?;
//! ```

pub mod accounts;
pub mod config;
pub mod core;
pub mod dev_data;
pub mod entities;
pub mod mail;
pub mod server;
pub mod storage;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        AppError, AppResult, AuthPolicy, Envelope, ListQuery, QueryFeatures, Role,
        TourStore, UserStore,
    };

    // === Entities ===
    pub use crate::entities::{Difficulty, Tour, User};

    // === Accounts & mail ===
    pub use crate::accounts::{AccountService, JwtService};
    pub use crate::mail::{Email, Mailer, MemoryMailer};

    // === Storage ===
    pub use crate::storage::{InMemoryTourStore, InMemoryUserStore, MongoTourStore, MongoUserStore};

    // === Config & server ===
    pub use crate::config::AppConfig;
    pub use crate::server::ServerBuilder;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use chrono::{DateTime, Utc};
    pub use uuid::Uuid;
}
