//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::host::{AppState, ServerHost};
use super::middleware::{panic_response, render_errors, security_headers, stamp_request_time};
use crate::config::AppConfig;
use crate::core::service::{TourStore, UserStore};
use crate::mail::{self, Mailer};
use anyhow::{Context, Result, anyhow};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Builder for the HTTP server
///
/// # Example
///
/// ```ignore
/// let config = AppConfig::from_env()?;
/// ServerBuilder::new(config)
///     .with_tour_store(MongoTourStore::new(db.clone()))
///     .with_user_store(MongoUserStore::new(db))
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    tours: Option<Arc<dyn TourStore>>,
    users: Option<Arc<dyn UserStore>>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            tours: None,
            users: None,
            mailer: None,
        }
    }

    /// Set the tour store (required)
    pub fn with_tour_store(mut self, store: impl TourStore + 'static) -> Self {
        self.tours = Some(Arc::new(store));
        self
    }

    /// Set the user store (required)
    pub fn with_user_store(mut self, store: impl UserStore + 'static) -> Self {
        self.users = Some(Arc::new(store));
        self
    }

    /// Override the mailer built from the mail configuration
    ///
    /// Tests pass a shared `MemoryMailer` here to read the reset links back.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(self) -> Result<ServerHost> {
        let tours = self
            .tours
            .ok_or_else(|| anyhow!("a tour store is required"))?;
        let users = self
            .users
            .ok_or_else(|| anyhow!("a user store is required"))?;
        let mailer = match self.mailer {
            Some(mailer) => mailer,
            None => mail::from_config(&self.config.mail)?,
        };

        Ok(ServerHost::new(self.config, tours, users, mailer))
    }

    /// Build the final router with the global middleware stack
    pub fn build(self) -> Result<Router> {
        let host = Arc::new(self.build_host()?);
        Self::router_for(host)
    }

    fn router_for(host: AppState) -> Result<Router> {
        let mut app = RestExposure::build_router(host.clone())?
            .layer(DefaultBodyLimit::max(host.config.server.body_limit))
            .layer(middleware::from_fn(stamp_request_time));

        for layer in security_headers() {
            app = app.layer(layer);
        }

        // Outermost first: tracing, error rendering, then panic recovery
        let app = app.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(host.clone(), render_errors))
                .layer(CatchPanicLayer::custom(panic_response(
                    host.lifecycle.clone(),
                ))),
        );

        Ok(app)
    }

    /// Build and serve until a shutdown signal or a handler panic
    ///
    /// Returns an error when the server stopped because a handler panicked,
    /// so the binary can exit with a failure status.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let host = Arc::new(self.build_host()?);
        let lifecycle = host.lifecycle.clone();
        let app = Self::router_for(host.clone())?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        tracing::info!(
            environment = host.environment().as_str(),
            "Server listening on {}",
            addr
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(host))
        .await?;

        if lifecycle.has_crashed() {
            anyhow::bail!("server stopped after an unrecoverable error");
        }
        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for SIGTERM, Ctrl+C or a crash reported by the panic handler
async fn shutdown_signal(host: AppState) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
        _ = host.lifecycle.crashed() => {
            tracing::error!("Unrecoverable error, initiating graceful shutdown...");
        },
    }
}
