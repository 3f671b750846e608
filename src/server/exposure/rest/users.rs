//! Account and user-administration handlers

use crate::accounts::Session;
use crate::core::auth::AuthPolicy;
use crate::core::error::AppResult;
use crate::core::extractors::{CurrentUser, QueryPairs, SESSION_COOKIE, ValidId};
use crate::core::query::QueryFeatures;
use crate::core::response::Envelope;
use crate::core::validation::ApiJson;
use crate::entities::user::{
    AdminUserUpdate, ForgotPasswordRequest, LoginRequest, NewPassword, SignupRequest,
    UpdatePasswordRequest, User,
};
use crate::server::host::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use cookie::Cookie;
use serde_json::{Value, json};

/// Token envelope plus the session cookie
fn send_token(state: &AppState, session: Session, status: StatusCode) -> Response {
    let cookie = Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.environment().is_production())
        .max_age(cookie::time::Duration::days(
            state.config.auth.cookie_expires_in_days,
        ))
        .build();

    let mut response = Envelope::data(json!({ "user": session.user.public_view() }))
        .with_token(session.token)
        .with_status(status)
        .into_response();

    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => tracing::warn!(error = %err, "session cookie is not a valid header"),
    }
    response
}

fn user_envelope(user: &User) -> Envelope {
    Envelope::data(json!({ "user": user.public_view() }))
}

/// `{proto}://{host}` the caller used to reach us
fn request_base_url(state: &AppState, headers: &HeaderMap) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let proto = header_str("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header_str(header::HOST.as_str())
        .unwrap_or_else(|| state.config.server.bind_addr());
    format!("{}://{}", proto, host)
}

// =============================================================================
// Authentication
// =============================================================================

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignupRequest>,
) -> AppResult<Response> {
    let session = state.accounts.signup(body).await?;
    Ok(send_token(&state, session, StatusCode::CREATED))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    let session = state.accounts.login(body.email, body.password).await?;
    Ok(send_token(&state, session, StatusCode::OK))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> AppResult<Envelope> {
    let base_url = request_base_url(&state, &headers);
    state.accounts.forgot_password(body.email, &base_url).await?;
    Ok(Envelope::message("Token sent to email!"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(body): ApiJson<NewPassword>,
) -> AppResult<Response> {
    let session = state.accounts.reset_password(&token, body).await?;
    Ok(send_token(&state, session, StatusCode::OK))
}

pub async fn update_my_password(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<UpdatePasswordRequest>,
) -> AppResult<Response> {
    let session = state
        .accounts
        .update_password(user.into_inner(), body)
        .await?;
    Ok(send_token(&state, session, StatusCode::OK))
}

// =============================================================================
// Own profile
// =============================================================================

pub async fn get_me(user: CurrentUser) -> Envelope {
    user_envelope(&user.0)
}

pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Envelope> {
    let user = state.accounts.update_me(user.into_inner(), body).await?;
    Ok(user_envelope(&user))
}

pub async fn delete_me(State(state): State<AppState>, user: CurrentUser) -> AppResult<StatusCode> {
    state.accounts.deactivate(user.into_inner()).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Administration
// =============================================================================

pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    QueryPairs(params): QueryPairs,
) -> AppResult<Envelope> {
    user.require(&AuthPolicy::admin_only())?;

    let query = QueryFeatures::<User>::apply(params);
    let users = state.users.find(&query).await?;
    Ok(Envelope::list("users", users))
}

pub async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidId(id): ValidId,
) -> AppResult<Envelope> {
    user.require(&AuthPolicy::admin_only())?;
    let found = state.accounts.get_user(&id).await?;
    Ok(user_envelope(&found))
}

pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidId(id): ValidId,
    ApiJson(body): ApiJson<AdminUserUpdate>,
) -> AppResult<Envelope> {
    user.require(&AuthPolicy::admin_only())?;
    let updated = state.accounts.update_user(&id, body).await?;
    Ok(user_envelope(&updated))
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidId(id): ValidId,
) -> AppResult<StatusCode> {
    user.require(&AuthPolicy::admin_only())?;
    state.accounts.delete_user(&id).await?;
    tracing::info!(user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
