//! Axum extractor for sanitized JSON bodies
//!
//! `ApiJson<T>` reads the body as JSON, sanitizes it (see
//! [`filters::sanitize`](super::filters::sanitize)) and deserializes the
//! result into `T`. Every rejection becomes an [`AppError`] so it is rendered
//! through the same envelope as any other failure.

use super::filters::sanitize;
use crate::core::error::{AppError, RequestError, ValidationError};
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Axum extractor that sanitizes then deserializes a JSON body
///
/// # Usage
///
/// ```rust,ignore
/// pub async fn login(ApiJson(body): ApiJson<LoginRequest>) -> AppResult<Envelope> {
///     // body has no `$`-operator keys and no raw HTML
/// }
/// ```
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload): Json<Value> = Json::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;

        serde_json::from_value(sanitize(payload))
            .map(ApiJson)
            .map_err(|e| {
                ValidationError::InvalidBody {
                    message: e.to_string(),
                }
                .into()
            })
    }
}

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return RequestError::PayloadTooLarge.into();
    }
    ValidationError::InvalidBody {
        message: rejection.body_text(),
    }
    .into()
}
