//! Domain service for authentication and session management.
//!
//! Issues session tokens on login, validates them on every request,
//! revokes them on logout and gates admin-only operations.

use serde::Serialize;
use thiserror::Error;

use crate::db::{Session, StoreError, User};

/// Errors specific to authentication operations.
///
/// Every credential or token failure collapses into
/// [`AuthError::InvalidCredentials`] so callers cannot tell an unknown
/// user from a wrong password or a revoked token from an expired one.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid or expired credentials")]
    InvalidCredentials,

    #[error("Admin access required")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Storage(e) => Self::Storage(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Account details for registration and provisioning. `password` is plaintext
/// and only lives until it is hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// A freshly issued session and the user it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub user: User,
    #[serde(skip)]
    pub session: Session,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and issues a new session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user, an
    /// inactive user or a wrong password.
    async fn authenticate(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Creates an account and logs it in.
    async fn register(&self, account: NewAccount) -> Result<LoginResult, AuthError>;

    /// Creates an account without issuing a session.
    async fn create_user(&self, account: NewAccount, is_admin: bool) -> Result<User, AuthError>;

    /// Resolves a token to its owner if the session is valid, unexpired and
    /// the owner is active.
    async fn validate(&self, token: &str) -> Result<User, AuthError>;

    /// Revokes a session. Unknown and already revoked tokens succeed too.
    async fn revoke(&self, token: &str) -> Result<(), AuthError>;

    /// Like [`AuthService::validate`], then requires the admin flag.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] for a valid non-admin session.
    async fn require_admin(&self, token: &str) -> Result<User, AuthError>;
}
