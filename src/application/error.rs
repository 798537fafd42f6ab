use thiserror::Error;

use crate::domain::{AccessDenied, ValidationError, Year};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Permission denied: {0}")]
    PermissionDenied(#[from] AccessDenied),

    #[error("No entitlement for {username} in {year}")]
    EntitlementNotFound { username: String, year: Year },

    #[error("Leave registration not found: {0}")]
    LeaveRegistrationNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Users already exist; create new users as an administrator")]
    AlreadyBootstrapped,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// True for errors that mean "the thing asked for is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::EntitlementNotFound { .. }
                | AppError::LeaveRegistrationNotFound(_)
                | AppError::UserNotFound(_)
        )
    }
}
