//! Axum extractors shared by the REST handlers
//!
//! - [`CurrentUser`]: resolves the session token (bearer header first, then
//!   the `jwt` cookie) to an active user
//! - [`ValidId`]: a `{id}` path segment that must parse as a UUID
//! - [`QueryPairs`]: the raw query string as ordered key/value pairs

use crate::core::auth::AuthPolicy;
use crate::core::error::{AppError, AppResult, AuthError};
use crate::entities::user::User;
use crate::server::host::AppState;
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use cookie::Cookie;
use uuid::Uuid;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "jwt";

/// The authenticated caller of a protected route
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Fail with 403 unless the caller satisfies `policy`
    pub fn require(&self, policy: &AuthPolicy) -> AppResult<()> {
        policy.enforce(self.0.role)
    }

    pub fn into_inner(self) -> User {
        self.0
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

/// Session token carried by a request, if any
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AuthError::NotLoggedIn)?;
        let user = state.accounts.authenticate(&token).await?;
        Ok(CurrentUser(user))
    }
}

/// A UUID path parameter; anything else is a 400
#[derive(Debug, Clone, Copy)]
pub struct ValidId(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for ValidId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Internal(format!("missing id parameter: {}", e)))?;
        Uuid::parse_str(&raw)
            .map(ValidId)
            .map_err(|_| AppError::invalid_id(raw))
    }
}

/// Query-string pairs in request order, percent-decoded
#[derive(Debug, Clone, Default)]
pub struct QueryPairs(pub Vec<(String, String)>);

impl<S: Send + Sync> FromRequestParts<S> for QueryPairs {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Unparseable query strings fall back to no parameters
        let pairs = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        Ok(QueryPairs(pairs))
    }
}
