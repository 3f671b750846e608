//! bcrypt hashing on the blocking thread pool

use crate::core::error::AppError;

pub async fn hash(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))
}

/// `false` for a wrong password; a malformed hash is an internal error
pub async fn verify(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("failed to verify password: {}", e)))
}
