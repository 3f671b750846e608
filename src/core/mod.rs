//! Core types shared by every layer: errors, auth policies, query features,
//! response envelopes, store traits and validation

pub mod auth;
pub mod error;
pub mod extractors;
pub mod query;
pub mod response;
pub mod service;
pub mod timestamp;
pub mod validation;

pub use auth::{AuthPolicy, Role};
pub use error::{AppError, AppResult, StorageError, StoreResult};
pub use extractors::{CurrentUser, QueryPairs, ValidId};
pub use query::{ListQuery, QueryFeatures, Queryable};
pub use response::Envelope;
pub use service::{TourStore, UserStore};
