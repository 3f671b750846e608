//! HTTP server: shared state, middleware and the REST exposure
//!
//! `ServerBuilder` wires the stores and mailer into a `ServerHost`, builds the
//! router with its global middleware stack and runs it until shutdown.

pub mod builder;
pub mod exposure;
pub mod host;
pub mod middleware;

pub use builder::ServerBuilder;
pub use host::{AppState, Lifecycle, ServerHost};
