//! Error types for account flows.

use keyward_store::StoreError;
use keyward_token::TokenError;
use thiserror::Error;

/// Errors returned by [`crate::AccountService`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; callers cannot tell which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The principal does not exist.
    #[error("unknown principal {0}")]
    UnknownPrincipal(i64),

    /// Registration input was rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// A blocking task (key generation, hashing) panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Whether the failure is the server's fault rather than the caller's.
    pub fn is_server_error(&self) -> bool {
        match self {
            AuthError::PasswordHash(_) | AuthError::Task(_) => true,
            AuthError::Token(e) => e.is_issuance_failure() || matches!(e, TokenError::KeyNotFound),
            AuthError::Store(e) => matches!(e, StoreError::Database(_) | StoreError::Migration(_)),
            _ => false,
        }
    }
}
