//! Typed error handling for the API
//!
//! Every handler returns [`AppResult`]. An [`AppError`] knows its HTTP status,
//! a machine-readable code and whether it is *operational* (an anticipated
//! failure whose message is safe to show to the caller) or a programming
//! error that must be hidden behind a generic message.
//!
//! # Error Categories
//!
//! - [`ResourceError`]: missing records, unknown routes, unique-field clashes
//! - [`ValidationError`]: bad input data or malformed identifiers
//! - [`AuthError`]: credentials, tokens, permissions and password resets
//! - [`RequestError`]: request-level guards (rate limit, body size, misuse of a route)
//! - [`StorageError`]: database failures, never shown verbatim
//!
//! Rendering is two-staged: `IntoResponse` writes the safe `{status, message}`
//! envelope and stashes an [`ErrorDetails`] extension on the response; the
//! global `render_errors` middleware then adds the verbose fields in
//! development and logs programming errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Message shown in place of any programming error
pub const GENERIC_ERROR_MESSAGE: &str = "Something went very wrong!";

/// The main error type of the API
#[derive(Debug)]
pub enum AppError {
    /// Resource lookup errors
    Resource(ResourceError),

    /// Input validation errors
    Validation(ValidationError),

    /// Authentication and authorization errors
    Auth(AuthError),

    /// Request guard errors
    Request(RequestError),

    /// Storage backend errors
    Storage(StorageError),

    /// Outgoing mail could not be delivered
    Mail(String),

    /// Anything else (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Resource(e) => write!(f, "{}", e),
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Request(e) => write!(f, "{}", e),
            AppError::Storage(e) => write!(f, "{}", e),
            AppError::Mail(_) => {
                write!(f, "There was an error sending the email. Try again later!")
            }
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Resource(e) => Some(e),
            AppError::Validation(e) => Some(e),
            AppError::Auth(e) => Some(e),
            AppError::Request(e) => Some(e),
            AppError::Storage(e) => Some(e),
            AppError::Mail(_) | AppError::Internal(_) => None,
        }
    }
}

/// Client-facing error envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// `fail` for 4xx, `error` otherwise
    pub status: &'static str,
    pub message: String,
}

/// Error metadata carried on the response for the rendering middleware
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub code: &'static str,
    pub status_code: StatusCode,
    pub operational: bool,
    /// Message, shown verbatim only when the error is operational
    pub message: String,
    /// Debug representation, only rendered in development
    pub detail: String,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Resource(e) => e.status_code(),
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(e) => e.status_code(),
            AppError::Request(e) => e.status_code(),
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Resource(e) => e.error_code(),
            AppError::Validation(e) => e.error_code(),
            AppError::Auth(e) => e.error_code(),
            AppError::Request(e) => e.error_code(),
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Mail(_) => "MAIL_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Envelope status derived from the status code range
    pub fn status(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Whether the message is safe to show to the caller
    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Storage(_) | AppError::Internal(_))
    }

    /// Convert to the client-facing envelope
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status(),
            message: if self.is_operational() {
                self.to_string()
            } else {
                GENERIC_ERROR_MESSAGE.to_string()
            },
        }
    }

    pub fn details(&self) -> ErrorDetails {
        ErrorDetails {
            code: self.error_code(),
            status_code: self.status_code(),
            operational: self.is_operational(),
            message: self.to_string(),
            detail: format!("{:?}", self),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        AppError::Resource(ResourceError::NotFound { resource })
    }

    pub fn invalid_id(value: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::InvalidId {
            value: value.into(),
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = self.details();
        let mut response = (status, Json(self.to_response())).into_response();
        response.extensions_mut().insert(details);
        response
    }
}

// =============================================================================
// Resource Errors
// =============================================================================

#[derive(Debug)]
pub enum ResourceError {
    /// No live record with the requested id
    NotFound { resource: &'static str },

    /// No route matched the request
    RouteNotFound { path: String },

    /// A unique field already holds this value
    Duplicate { field: String, value: String },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { resource } => {
                write!(f, "No {} found with that ID", resource)
            }
            ResourceError::RouteNotFound { path } => {
                write!(f, "Can't find {} on this server!", path)
            }
            ResourceError::Duplicate { value, .. } => {
                write!(
                    f,
                    "Duplicate field value: {}. Please use another value!",
                    value
                )
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResourceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResourceError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ResourceError::Duplicate { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::NotFound { .. } => "NOT_FOUND",
            ResourceError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            ResourceError::Duplicate { .. } => "DUPLICATE_FIELD",
        }
    }
}

impl From<ResourceError> for AppError {
    fn from(err: ResourceError) -> Self {
        AppError::Resource(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

#[derive(Debug)]
pub enum ValidationError {
    /// One or more field rules failed
    FieldErrors(Vec<FieldValidationError>),

    /// A path identifier is not a valid id
    InvalidId { value: String },

    /// A path or query parameter has the wrong shape
    InvalidParam { name: String, value: String },

    /// The body is not the JSON object we expected
    InvalidBody { message: String },
}

/// A single field validation error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl FieldValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                write!(f, "Invalid input data. {}", msgs.join(". "))
            }
            ValidationError::InvalidId { value } => write!(f, "Invalid _id: {}.", value),
            ValidationError::InvalidParam { name, value } => {
                write!(f, "Invalid {}: {}.", name, value)
            }
            ValidationError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::FieldErrors(_) => "VALIDATION_ERROR",
            ValidationError::InvalidId { .. } => "INVALID_ID",
            ValidationError::InvalidParam { .. } => "INVALID_PARAMETER",
            ValidationError::InvalidBody { .. } => "INVALID_BODY",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<Vec<FieldValidationError>> for AppError {
    fn from(errors: Vec<FieldValidationError>) -> Self {
        AppError::Validation(ValidationError::FieldErrors(errors))
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    IncorrectCredentials,
    NotLoggedIn,
    UserNoLongerExists,
    PasswordChanged,
    InvalidToken,
    ExpiredToken,
    Forbidden,
    WrongCurrentPassword,
    NoUserWithEmail,
    ResetTokenInvalid,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AuthError::MissingCredentials => "Please provide email and password!",
            AuthError::IncorrectCredentials => "Incorrect email or password",
            AuthError::NotLoggedIn => "You are not logged in! Please log in to get access.",
            AuthError::UserNoLongerExists => "The user belonging to this token no longer exists.",
            AuthError::PasswordChanged => "User recently changed password! Please log in again.",
            AuthError::InvalidToken => "Invalid token. Please log in again!",
            AuthError::ExpiredToken => "Your token has expired! Please log in again.",
            AuthError::Forbidden => "You do not have permission to perform this action",
            AuthError::WrongCurrentPassword => "Your current password is wrong.",
            AuthError::NoUserWithEmail => "There is no user with that email address.",
            AuthError::ResetTokenInvalid => "Token is invalid or has expired",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::ResetTokenInvalid => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::NoUserWithEmail => StatusCode::NOT_FOUND,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "MISSING_CREDENTIALS",
            AuthError::IncorrectCredentials => "INCORRECT_CREDENTIALS",
            AuthError::NotLoggedIn => "NOT_LOGGED_IN",
            AuthError::UserNoLongerExists => "USER_NO_LONGER_EXISTS",
            AuthError::PasswordChanged => "PASSWORD_CHANGED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::WrongCurrentPassword => "WRONG_CURRENT_PASSWORD",
            AuthError::NoUserWithEmail => "NO_USER_WITH_EMAIL",
            AuthError::ResetTokenInvalid => "RESET_TOKEN_INVALID",
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

#[derive(Debug)]
pub enum RequestError {
    /// Password fields sent to a profile update route
    PasswordUpdateNotAllowed,

    /// Rate limit window exhausted
    TooManyRequests,

    /// Body exceeds the configured limit
    PayloadTooLarge,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::PasswordUpdateNotAllowed => write!(
                f,
                "This route is not for password updates. Please use /updateMyPassword."
            ),
            RequestError::TooManyRequests => write!(
                f,
                "Too many requests from this IP, please try again in an hour!"
            ),
            RequestError::PayloadTooLarge => write!(f, "Request body is too large"),
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::PasswordUpdateNotAllowed => StatusCode::BAD_REQUEST,
            RequestError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            RequestError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::PasswordUpdateNotAllowed => "PASSWORD_UPDATE_NOT_ALLOWED",
            RequestError::TooManyRequests => "TOO_MANY_REQUESTS",
            RequestError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::Request(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by store implementations
#[derive(Debug)]
pub enum StorageError {
    /// Query execution error
    QueryError { backend: String, message: String },

    /// A unique index rejected the write
    Duplicate { field: String, value: String },

    /// A stored record could not be converted to or from its model
    Serialization { message: String },

    /// Shared state poisoned or otherwise unusable
    Unavailable { backend: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::QueryError { backend, message } => {
                write!(f, "{} query error: {}", backend, message)
            }
            StorageError::Duplicate { field, value } => {
                write!(f, "Duplicate value '{}' for unique field '{}'", value, field)
            }
            StorageError::Serialization { message } => {
                write!(f, "Serialization error: {}", message)
            }
            StorageError::Unavailable { backend } => {
                write!(f, "Storage backend '{}' is unavailable", backend)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate { field, value } => {
                AppError::Resource(ResourceError::Duplicate { field, value })
            }
            other => AppError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("serialization failed: {}", err))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Result type aliases
// =============================================================================

pub type AppResult<T> = Result<T, AppError>;

pub type StoreResult<T> = Result<T, StorageError>;

// =============================================================================
// Tests
// =============================================================================
