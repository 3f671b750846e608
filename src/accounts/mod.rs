//! Authentication: password hashing, JWT sessions and account workflows

pub mod password;
pub mod service;
pub mod tokens;

pub use service::{AccountService, Session};
pub use tokens::{Claims, JwtService};
