//! Account workflows: signup, login, token checks and password management

use super::password;
use super::tokens::JwtService;
use crate::core::error::{AppError, AppResult, AuthError, RequestError, ValidationError};
use crate::core::service::UserStore;
use crate::core::validation::validate;
use crate::entities::user::{
    AdminUserUpdate, NewPassword, ProfileUpdate, SignupRequest, UpdatePasswordRequest, User,
    hash_reset_token, normalize_email,
};
use crate::mail::{Email, Mailer};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Body keys rejected by the profile update route
const PASSWORD_FIELDS: [&str; 2] = ["password", "passwordConfirm"];

/// A signed-in user with a freshly issued token
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    jwt: Arc<JwtService>,
    bcrypt_cost: u32,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        jwt: Arc<JwtService>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            mailer,
            jwt,
            bcrypt_cost,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    fn session(&self, user: User) -> AppResult<Session> {
        let token = self.jwt.issue(user.id)?;
        Ok(Session { token, user })
    }

    async fn persist(&self, user: User) -> AppResult<User> {
        self.users
            .save(user)
            .await?
            .ok_or_else(|| AppError::not_found("user"))
    }

    pub async fn signup(&self, request: SignupRequest) -> AppResult<Session> {
        let request = SignupRequest {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            ..request
        };
        validate(&request)?;

        let hash = password::hash(request.password, self.bcrypt_cost).await?;
        let user = User::new(request.name, request.email, request.photo, hash, Utc::now());
        let user = self.users.create(user).await?;

        tracing::info!(user_id = %user.id, "user signed up");
        self.session(user)
    }

    pub async fn login(&self, email: Option<String>, password: Option<String>) -> AppResult<Session> {
        let (Some(email), Some(password)) = (
            email.filter(|e| !e.trim().is_empty()),
            password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AuthError::MissingCredentials.into());
        };

        let Some(user) = self.users.find_by_email(&normalize_email(&email)).await? else {
            return Err(AuthError::IncorrectCredentials.into());
        };
        if !password::verify(password, user.password.clone()).await? {
            return Err(AuthError::IncorrectCredentials.into());
        }

        self.session(user)
    }

    /// Resolve a bearer token to the active user it was issued for
    pub async fn authenticate(&self, token: &str) -> AppResult<User> {
        let claims = self.jwt.verify(token)?;

        let user = self
            .users
            .get(&claims.id)
            .await?
            .ok_or(AuthError::UserNoLongerExists)?;

        if user.changed_password_after(claims.iat) {
            return Err(AuthError::PasswordChanged.into());
        }
        Ok(user)
    }

    /// Email a reset link built on `base_url`
    ///
    /// When delivery fails the token is withdrawn again so no usable token is
    /// left behind.
    pub async fn forgot_password(&self, email: Option<String>, base_url: &str) -> AppResult<()> {
        let email = email.as_deref().map(normalize_email).unwrap_or_default();
        let mut user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::NoUserWithEmail)?;

        let token = user.create_password_reset_token(Utc::now());
        let mut user = self.persist(user).await?;

        let reset_url = format!("{}/api/v1/users/resetPassword/{}", base_url, token);
        if let Err(err) = self
            .mailer
            .send(Email::password_reset(user.email.clone(), &reset_url))
            .await
        {
            tracing::warn!(user_id = %user.id, error = %err, "password reset email failed");
            user.clear_reset_token();
            self.persist(user).await?;
            return Err(AppError::Mail(err.to_string()));
        }

        Ok(())
    }

    pub async fn reset_password(&self, token: &str, body: NewPassword) -> AppResult<Session> {
        let now = Utc::now();
        let mut user = self
            .users
            .find_by_reset_token(&hash_reset_token(token), now)
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;

        validate(&body)?;
        let hash = password::hash(body.password, self.bcrypt_cost).await?;
        user.set_password(hash, now);
        let user = self.persist(user).await?;

        self.session(user)
    }

    pub async fn update_password(
        &self,
        user: User,
        body: UpdatePasswordRequest,
    ) -> AppResult<Session> {
        if !password::verify(body.password_current.clone(), user.password.clone()).await? {
            return Err(AuthError::WrongCurrentPassword.into());
        }
        validate(&body)?;

        let mut user = user;
        let hash = password::hash(body.password, self.bcrypt_cost).await?;
        user.set_password(hash, Utc::now());
        let user = self.persist(user).await?;

        self.session(user)
    }

    /// Apply name/email/photo changes from a raw body
    pub async fn update_me(&self, user: User, body: Value) -> AppResult<User> {
        if let Value::Object(map) = &body {
            if PASSWORD_FIELDS.iter().any(|f| map.contains_key(*f)) {
                return Err(RequestError::PasswordUpdateNotAllowed.into());
            }
        }

        let update: ProfileUpdate = serde_json::from_value(body).map_err(|e| {
            AppError::Validation(ValidationError::InvalidBody {
                message: e.to_string(),
            })
        })?;
        let update = update.normalized();
        validate(&update)?;

        let mut user = user;
        update.apply_to(&mut user);
        self.persist(user).await
    }

    /// Soft delete: the account stays stored but becomes invisible
    pub async fn deactivate(&self, user: User) -> AppResult<()> {
        let user_id = user.id;
        let mut user = user;
        user.active = false;
        self.persist(user).await?;
        tracing::info!(user_id = %user_id, "user deactivated");
        Ok(())
    }

    pub async fn get_user(&self, id: &Uuid) -> AppResult<User> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))
    }

    /// Administrative update of profile fields and role
    pub async fn update_user(&self, id: &Uuid, update: AdminUserUpdate) -> AppResult<User> {
        let mut user = self.get_user(id).await?;

        let profile = update.profile.normalized();
        validate(&profile)?;
        profile.apply_to(&mut user);
        if let Some(role) = update.role {
            user.role = role;
        }

        self.persist(user).await
    }

    pub async fn delete_user(&self, id: &Uuid) -> AppResult<()> {
        if self.users.delete(id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("user"))
        }
    }
}
