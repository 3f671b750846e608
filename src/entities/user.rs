//! User model and the request bodies of the account routes

use crate::core::auth::Role;
use crate::core::query::{FieldKind, Queryable};
use crate::core::timestamp;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

/// Lifetime of a password reset token
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

const RESET_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// bcrypt hash, never the plain password
    pub password: String,
    #[serde(
        default,
        with = "timestamp::serde_millis_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(
        default,
        with = "timestamp::serde_millis_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(with = "timestamp::serde_millis")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl User {
    /// A fresh, active account with the default role
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        photo: Option<String>,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            photo,
            role: Role::default(),
            password: password_hash.into(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: now,
        }
    }

    /// Client representation without credentials or account state
    pub fn public_view(&self) -> Value {
        let mut doc = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut doc {
            for field in User::protected_fields() {
                map.remove(*field);
            }
        }
        doc
    }

    /// Whether the password changed after a token issued at `iat` (seconds)
    pub fn changed_password_after(&self, iat: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| changed.timestamp() > iat)
    }

    /// Store a new password hash on an existing account
    ///
    /// `passwordChangedAt` is backdated by a second so a token issued right
    /// after the change is still accepted.
    pub fn set_password(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.password = password_hash;
        self.password_changed_at = Some(now - Duration::seconds(1));
        self.clear_reset_token();
    }

    /// Generate a reset token; returns the raw token, only its hash is kept
    pub fn create_password_reset_token(&mut self, now: DateTime<Utc>) -> String {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.password_reset_token = Some(hash_reset_token(&token));
        self.password_reset_expires = Some(now + Duration::minutes(RESET_TOKEN_TTL_MINUTES));
        token
    }

    pub fn clear_reset_token(&mut self) {
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }
}

/// SHA-256 hex digest of a raw reset token
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl Queryable for User {
    fn field_kind(field: &str) -> Option<FieldKind> {
        let kind = match field {
            "id" | "name" | "email" | "photo" | "role" => FieldKind::String,
            "createdAt" | "passwordChangedAt" => FieldKind::Date,
            _ => return None,
        };
        Some(kind)
    }

    fn protected_fields() -> &'static [&'static str] {
        &[
            "password",
            "passwordResetToken",
            "passwordResetExpires",
            "active",
        ]
    }
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: Option<String>,
}

/// New password with its confirmation (reset flow)
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewPassword {
    #[serde(default)]
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub password_current: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

/// Profile fields a user may change on their own account
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Fields an administrator may change on any account
#[derive(Debug, Default, Deserialize)]
pub struct AdminUserUpdate {
    #[serde(flatten)]
    pub profile: ProfileUpdate,
    #[serde(default)]
    pub role: Option<Role>,
}

impl ProfileUpdate {
    /// Trim the name and normalize the email before they are validated
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|name| name.trim().to_string());
        self.email = self.email.as_deref().map(normalize_email);
        self
    }

    /// Apply the present fields; call after [`normalized`](Self::normalized)
    pub fn apply_to(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(photo) = self.photo {
            user.photo = Some(photo);
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
