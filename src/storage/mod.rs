//! Store implementations
//!
//! - [`in_memory`]: `RwLock`-guarded maps, used by tests and local runs
//! - [`mongodb`]: the production backend

pub mod document;
pub mod in_memory;
pub mod mongodb;

pub use in_memory::{InMemoryTourStore, InMemoryUserStore};
pub use mongodb::{MongoTourStore, MongoUserStore};
