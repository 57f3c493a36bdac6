//! Domain service for admin-only user and session management.
//!
//! Every operation authorizes the caller's session token before touching
//! storage, so a revoked or demoted admin loses access immediately.

use crate::db::{SessionSummary, User};
use crate::services::auth_service::{AuthError, NewAccount};

/// Admin edits to a user account.
#[derive(Debug, Clone, Default)]
pub struct AdminUserUpdate {
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
    pub full_name: Option<String>,
}

#[async_trait::async_trait]
pub trait AdminService: Send + Sync {
    async fn list_users(&self, token: &str) -> Result<Vec<User>, AuthError>;

    async fn create_user(
        &self,
        token: &str,
        account: NewAccount,
        is_admin: bool,
    ) -> Result<User, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] when an admin tries to deactivate or
    /// demote their own account.
    async fn update_user(
        &self,
        token: &str,
        user_id: i32,
        update: AdminUserUpdate,
    ) -> Result<User, AuthError>;

    /// Hard-deletes a user and, through the cascading foreign key, their sessions.
    async fn delete_user(&self, token: &str, user_id: i32) -> Result<(), AuthError>;

    async fn list_sessions(&self, token: &str) -> Result<Vec<SessionSummary>, AuthError>;

    async fn revoke_session(&self, token: &str, session_id: i32) -> Result<(), AuthError>;
}
