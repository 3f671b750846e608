//! Shared application state handed to every handler
//!
//! The `ServerHost` holds the stores, the account service and the loaded
//! configuration. Handlers receive it as [`AppState`], an `Arc` around the
//! host, so cloning state per request is a pointer copy.

use crate::accounts::{AccountService, JwtService};
use crate::config::{AppConfig, Environment};
use crate::core::service::{TourStore, UserStore};
use crate::mail::Mailer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Axum state type used by every router in the application
pub type AppState = Arc<ServerHost>;

/// Host context containing all application state
///
/// # Example
///
/// ```rust,ignore
/// let host = Arc::new(ServerHost::new(config, tours, users, mailer));
/// let app = RestExposure::build_router(host)?;
/// ```
pub struct ServerHost {
    /// Loaded configuration
    pub config: Arc<AppConfig>,

    /// Tour persistence
    pub tours: Arc<dyn TourStore>,

    /// User persistence, also reachable through `accounts`
    pub users: Arc<dyn UserStore>,

    /// Signup, login, token checks and password workflows
    pub accounts: AccountService,

    /// Tracks whether the process must stop after a crash
    pub lifecycle: Arc<Lifecycle>,
}

impl ServerHost {
    pub fn new(
        config: AppConfig,
        tours: Arc<dyn TourStore>,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let jwt = Arc::new(JwtService::new(
            &config.auth.jwt_secret,
            config.auth.jwt_expires_in,
        ));
        let accounts = AccountService::new(users.clone(), mailer, jwt, config.auth.bcrypt_cost);

        Self {
            config: Arc::new(config),
            tours,
            users,
            accounts,
            lifecycle: Arc::new(Lifecycle::default()),
        }
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }
}

/// Process lifecycle shared between the panic handler and the listener
///
/// A handler panic is a programming error: the request still gets a generic
/// 500, then the listener drains and the process exits with a failure code.
#[derive(Debug, Default)]
pub struct Lifecycle {
    crashed: AtomicBool,
    shutdown: Notify,
}

impl Lifecycle {
    /// Record a fatal error and wake the shutdown watcher
    pub fn crash(&self) {
        self.crashed.store(true, Ordering::SeqCst);
        // notify_one keeps a permit if nobody is waiting yet
        self.shutdown.notify_one();
    }

    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Resolves once [`crash`](Self::crash) has been called
    pub async fn crashed(&self) {
        self.shutdown.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_crash_wakes_waiter_registered_later() {
        let lifecycle = Lifecycle::default();
        assert!(!lifecycle.has_crashed());

        lifecycle.crash();
        tokio::time::timeout(Duration::from_secs(1), lifecycle.crashed())
            .await
            .expect("crash permit should be stored");
        assert!(lifecycle.has_crashed());
    }
}
