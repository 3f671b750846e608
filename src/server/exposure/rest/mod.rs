//! REST API exposure
//!
//! Consumes a `ServerHost` and produces the Axum router for `/api/v1`, the
//! health probes and the fallbacks (static files, then the JSON 404).

pub mod tours;
pub mod users;

use super::super::host::AppState;
use super::super::middleware::{RateLimiter, rate_limit};
use crate::core::error::{AppError, ResourceError};
use anyhow::Result;
use axum::extract::OriginalUri;
use axum::handler::HandlerWithoutStateExt;
use axum::routing::{get, patch, post};
use axum::{Json, Router, middleware};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Prefix every API route is mounted under
pub const API_PREFIX: &str = "/api/v1";

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a router with:
    /// - Health check routes
    /// - Tour and user routes under [`API_PREFIX`], rate limited per client
    /// - Static files from the configured directory
    /// - A JSON 404 for everything else
    pub fn build_router(host: AppState) -> Result<Router> {
        let limiter = Arc::new(RateLimiter::new(host.config.server.rate_limit));

        let api = Router::new()
            .merge(Self::tour_routes())
            .merge(Self::user_routes())
            .layer(middleware::from_fn_with_state(limiter, rate_limit));

        let static_files = ServeDir::new(&host.config.server.static_dir)
            .call_fallback_on_method_not_allowed(true)
            .not_found_service(route_not_found.into_service());

        let app = Self::health_routes()
            .nest(API_PREFIX, api)
            .method_not_allowed_fallback(route_not_found)
            .fallback_service(static_files)
            .with_state(host);

        Ok(app)
    }

    fn tour_routes() -> Router<AppState> {
        Router::new()
            .route("/tours", get(tours::list_tours).post(tours::create_tour))
            .route("/tours/top-5-cheap", get(tours::top_five_cheap))
            .route("/tours/tour-stats", get(tours::tour_stats))
            .route("/tours/monthly-plan/{year}", get(tours::monthly_plan))
            .route(
                "/tours/{id}",
                get(tours::get_tour)
                    .patch(tours::update_tour)
                    .delete(tours::delete_tour),
            )
    }

    fn user_routes() -> Router<AppState> {
        Router::new()
            .route("/users/signup", post(users::signup))
            .route("/users/login", post(users::login))
            .route("/users/forgotPassword", post(users::forgot_password))
            .route("/users/resetPassword/{token}", patch(users::reset_password))
            .route("/users/updateMyPassword", patch(users::update_my_password))
            .route("/users/me", get(users::get_me))
            .route("/users/updateMe", patch(users::update_me))
            .route("/users/deleteMe", axum::routing::delete(users::delete_me))
            .route("/users", get(users::list_users))
            .route(
                "/users/{id}",
                get(users::get_user)
                    .patch(users::update_user)
                    .delete(users::delete_user),
            )
    }

    /// Build health check routes
    fn health_routes() -> Router<AppState> {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "natours"
        }))
    }
}

/// JSON 404 for anything no route or static file answered
async fn route_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    ResourceError::RouteNotFound { path }.into()
}
