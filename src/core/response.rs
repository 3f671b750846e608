//! Success envelopes
//!
//! Every successful response is wrapped as `{status: "success", ...}` with
//! an optional `results` count, `token` or `message` next to `data`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip)]
    pub status_code: StatusCode,
}

impl Envelope {
    /// `{status, data}`
    pub fn data(data: Value) -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            message: None,
            data: Some(data),
            status_code: StatusCode::OK,
        }
    }

    /// `{status, results, data: {<key>: [...]}}`
    pub fn list(key: &str, items: Vec<Value>) -> Self {
        let results = items.len();
        let mut data = serde_json::Map::new();
        data.insert(key.to_string(), Value::Array(items));
        Self {
            results: Some(results),
            ..Self::data(Value::Object(data))
        }
    }

    /// `{status, message}`
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            data: None,
            ..Self::data(Value::Null)
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}
