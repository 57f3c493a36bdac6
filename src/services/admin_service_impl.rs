//! `SeaORM` implementation of the `AdminService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::db::{SessionSummary, Store, User, UserUpdate};
use crate::services::admin_service::{AdminService, AdminUserUpdate};
use crate::services::auth_service::{AuthError, AuthService, NewAccount};

pub struct SeaOrmAdminService {
    store: Store,
    auth: Arc<dyn AuthService>,
}

impl SeaOrmAdminService {
    #[must_use]
    pub fn new(store: Store, auth: Arc<dyn AuthService>) -> Self {
        Self { store, auth }
    }
}

#[async_trait]
impl AdminService for SeaOrmAdminService {
    async fn list_users(&self, token: &str) -> Result<Vec<User>, AuthError> {
        self.auth.require_admin(token).await?;
        Ok(self.store.list_users().await?)
    }

    async fn create_user(
        &self,
        token: &str,
        account: NewAccount,
        is_admin: bool,
    ) -> Result<User, AuthError> {
        let admin = self.auth.require_admin(token).await?;
        let user = self.auth.create_user(account, is_admin).await?;

        info!(
            event = "admin_user_created",
            admin_id = admin.id,
            user_id = user.id,
            "Admin created user"
        );
        Ok(user)
    }

    async fn update_user(
        &self,
        token: &str,
        user_id: i32,
        update: AdminUserUpdate,
    ) -> Result<User, AuthError> {
        let admin = self.auth.require_admin(token).await?;

        if admin.id == user_id {
            if update.is_active == Some(false) {
                return Err(AuthError::Validation(
                    "Cannot disable your own account".to_string(),
                ));
            }
            if update.is_admin == Some(false) {
                return Err(AuthError::Validation(
                    "Cannot remove your own admin privileges".to_string(),
                ));
            }
        }

        let user = self
            .store
            .update_user(
                user_id,
                UserUpdate {
                    email: None,
                    full_name: update.full_name,
                    is_active: update.is_active,
                    is_admin: update.is_admin,
                },
            )
            .await?;

        info!(
            event = "admin_user_updated",
            admin_id = admin.id,
            user_id,
            is_active = user.is_active,
            is_admin = user.is_admin,
            "Admin updated user"
        );
        Ok(user)
    }

    async fn delete_user(&self, token: &str, user_id: i32) -> Result<(), AuthError> {
        let admin = self.auth.require_admin(token).await?;

        if admin.id == user_id {
            return Err(AuthError::Validation(
                "Cannot delete your own account".to_string(),
            ));
        }

        self.store.delete_user(user_id).await?;

        info!(
            event = "admin_user_deleted",
            admin_id = admin.id,
            user_id, "Admin deleted user"
        );
        Ok(())
    }

    async fn list_sessions(&self, token: &str) -> Result<Vec<SessionSummary>, AuthError> {
        self.auth.require_admin(token).await?;
        Ok(self.store.list_sessions().await?)
    }

    async fn revoke_session(&self, token: &str, session_id: i32) -> Result<(), AuthError> {
        let admin = self.auth.require_admin(token).await?;
        self.store.invalidate_session_by_id(session_id).await?;

        info!(
            event = "admin_session_revoked",
            admin_id = admin.id,
            session_id, "Admin revoked session"
        );
        Ok(())
    }
}
