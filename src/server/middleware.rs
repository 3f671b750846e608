//! Global request/response middleware
//!
//! - [`render_errors`]: adds development-only error detail and logs programming errors
//! - [`stamp_request_time`]: records when the request arrived
//! - [`rate_limit`]: per-client fixed window on `/api`
//! - [`security_headers`]: conservative response headers
//! - [`panic_response`]: turns a handler panic into a generic 500 and stops the server

use super::host::{AppState, Lifecycle};
use crate::config::{Environment, RateLimitConfig};
use crate::core::error::{AppError, ErrorDetails, RequestError};
use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::set_header::SetResponseHeaderLayer;

/// When the request reached the server
#[derive(Debug, Clone, Copy)]
pub struct RequestTime(pub DateTime<Utc>);

pub async fn stamp_request_time(mut req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(RequestTime(Utc::now()));

    let response = next.run(req).await;

    tracing::debug!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

/// Rewrite error responses according to the environment
///
/// Error bodies leave the handlers already safe for production. In
/// development the code, status and debug representation are added under
/// `error`, and programming errors show their real message.
pub async fn render_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(details) = response.extensions().get::<ErrorDetails>().cloned() else {
        return response;
    };

    if !details.operational {
        tracing::error!(
            code = details.code,
            status = details.status_code.as_u16(),
            detail = %details.detail,
            "unexpected error"
        );
    }

    match state.environment() {
        Environment::Production => response,
        Environment::Development => {
            let status = if details.status_code.is_client_error() {
                "fail"
            } else {
                "error"
            };
            let body = json!({
                "status": status,
                "message": details.message,
                "error": {
                    "code": details.code,
                    "statusCode": details.status_code.as_u16(),
                    "isOperational": details.operational,
                    "detail": details.detail,
                },
            });
            let (mut parts, _) = response.into_parts();
            parts.headers.remove(header::CONTENT_LENGTH);
            (parts, Json(body)).into_response()
        }
    }
}

// =============================================================================
// Rate limiting
// =============================================================================

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Key used when the peer address is unknown (e.g. in-process tests)
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed-window request counter keyed by client address
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request from `client` at `now`
    pub fn hit(&self, client: &str, now: Instant) -> RateDecision {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Expired windows are dropped so the map does not grow without bound
        clients.retain(|_, w| now.duration_since(w.started) < self.window);

        let window = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });
        window.hits = window.hits.saturating_add(1);

        RateDecision {
            allowed: window.hits <= self.max_requests,
            remaining: self.max_requests.saturating_sub(window.hits),
        }
    }
}

fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn set_rate_headers(response: &mut Response, limit: u32, remaining: u32) {
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static(LIMIT_HEADER), HeaderValue::from(limit));
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(remaining),
    );
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);
    let decision = limiter.hit(&client, Instant::now());

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!(client, "rate limit exceeded");
        AppError::from(RequestError::TooManyRequests).into_response()
    };
    set_rate_headers(&mut response, limiter.max_requests(), decision.remaining);
    response
}

// =============================================================================
// Security headers
// =============================================================================

/// Header layers added to every response unless a handler already set them
pub fn security_headers() -> Vec<SetResponseHeaderLayer<HeaderValue>> {
    [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "no-referrer"),
        (header::X_XSS_PROTECTION, "0"),
        (
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=15552000; includeSubDomains",
        ),
    ]
    .into_iter()
    .map(|(name, value)| {
        SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
    })
    .collect()
}

// =============================================================================
// Panics
// =============================================================================

fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Response for a panicking handler; also schedules the shutdown
pub fn panic_response(
    lifecycle: Arc<Lifecycle>,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone {
    move |err| {
        let message = panic_message(err.as_ref());
        tracing::error!(panic = %message, "handler panicked, shutting down");
        lifecycle.crash();
        AppError::Internal(message).into_response()
    }
}
