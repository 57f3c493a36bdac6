//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task;
use tracing::{debug, info, warn};

use crate::config::{SecurityConfig, SessionConfig};
use crate::db::{NewUser, Session, Store, StoreError, User};
use crate::services::auth_service::{AuthError, AuthService, LoginResult, NewAccount};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{RandomTokenGenerator, TokenGenerator};

const MAX_USERNAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 255;

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    session: SessionConfig,
    tokens: Arc<dyn TokenGenerator>,
    dummy_hash: OnceCell<String>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, security: SecurityConfig, session: SessionConfig) -> Self {
        Self::with_token_generator(store, security, session, Arc::new(RandomTokenGenerator))
    }

    #[must_use]
    pub fn with_token_generator(
        store: Store,
        security: SecurityConfig,
        session: SessionConfig,
        tokens: Arc<dyn TokenGenerator>,
    ) -> Self {
        Self {
            store,
            security,
            session,
            tokens,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Insert a session for `user_id`, regenerating the token once on a
    /// uniqueness conflict. A second conflict is treated as a storage fault.
    async fn issue_session(&self, user_id: i32) -> Result<Session, AuthError> {
        let expires_at = Utc::now() + self.session.lifetime();

        let token = self.tokens.generate();
        match self.store.record_login(user_id, &token, expires_at).await {
            Err(e) if e.is_conflict() => {
                warn!(
                    event = "session_token_collision",
                    user_id, "Session token collision, regenerating"
                );
                metrics::counter!("auth_token_collisions_total").increment(1);

                let token = self.tokens.generate();
                self.store
                    .record_login(user_id, &token, expires_at)
                    .await
                    .map_err(|e| match e {
                        StoreError::Conflict(msg) => {
                            AuthError::Storage(format!("Repeated session token collision: {msg}"))
                        }
                        other => AuthError::from(other),
                    })
            }
            other => other.map_err(AuthError::from),
        }
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let config = self.security.clone();

        task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task panicked: {e}")))?
            .map_err(AuthError::from)
    }

    async fn verify(&self, password: &str, password_hash: String) -> Result<bool, AuthError> {
        let password = password.to_string();

        let verified = task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task panicked: {e}")))?;

        Ok(verified.unwrap_or_else(|e| {
            warn!(error = %e, "Stored password hash is unreadable");
            false
        }))
    }

    /// Spend the same hashing work on unknown usernames as on real ones.
    async fn verify_against_dummy(&self, password: &str) -> Result<(), AuthError> {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| async move {
                let seed = self.tokens.generate();
                self.hash(&seed).await
            })
            .await?
            .clone();

        self.verify(password, dummy).await?;
        Ok(())
    }

    fn check_account(&self, account: &NewAccount) -> Result<(), AuthError> {
        let username = account.username.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("Username is required".to_string()));
        }
        if username.len() > MAX_USERNAME_LEN {
            return Err(AuthError::Validation(format!(
                "Username must be at most {MAX_USERNAME_LEN} characters"
            )));
        }

        let email = account.email.trim();
        if email.len() > MAX_EMAIL_LEN || !is_plausible_email(email) {
            return Err(AuthError::Validation("A valid email is required".to_string()));
        }

        if account.password.len() < self.security.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.security.min_password_length
            )));
        }

        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn authenticate(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let Some((user, password_hash)) = self.store.get_user_with_password(username).await? else {
            self.verify_against_dummy(password).await?;
            metrics::counter!("auth_login_total", "outcome" => "rejected").increment(1);
            debug!(event = "login_rejected", "Unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = self.verify(password, password_hash).await?;

        if !password_ok || !user.is_active {
            metrics::counter!("auth_login_total", "outcome" => "rejected").increment(1);
            debug!(
                event = "login_rejected",
                user_id = user.id,
                inactive = !user.is_active,
                "Login rejected"
            );
            return Err(AuthError::InvalidCredentials);
        }

        // The account can vanish between the lookup and the insert.
        let session = self.issue_session(user.id).await.map_err(|e| match e {
            AuthError::NotFound(_) => AuthError::InvalidCredentials,
            other => other,
        })?;

        // Re-read so the caller sees the new last_login_at.
        let user = self
            .store
            .get_user_by_id(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        metrics::counter!("auth_login_total", "outcome" => "success").increment(1);
        info!(event = "login_succeeded", user_id = user.id, "User logged in");

        Ok(LoginResult { user, session })
    }

    async fn register(&self, account: NewAccount) -> Result<LoginResult, AuthError> {
        let user = self.create_user(account, false).await?;
        let session = self.issue_session(user.id).await?;

        let user = self
            .store
            .get_user_by_id(user.id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("User {}", user.id)))?;

        info!(event = "user_registered", user_id = user.id, "User registered");
        Ok(LoginResult { user, session })
    }

    async fn create_user(&self, account: NewAccount, is_admin: bool) -> Result<User, AuthError> {
        self.check_account(&account)?;

        let password_hash = self.hash(&account.password).await?;

        let user = self
            .store
            .create_user(NewUser {
                username: account.username.trim().to_string(),
                email: account.email.trim().to_string(),
                password_hash,
                full_name: account.full_name.filter(|name| !name.trim().is_empty()),
                is_admin,
            })
            .await?;

        info!(event = "user_created", user_id = user.id, is_admin, "User created");
        Ok(user)
    }

    async fn validate(&self, token: &str) -> Result<User, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let Some((session, user)) = self.store.get_session_with_user(token).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !session.is_valid || session.is_expired_at(Utc::now()) || !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let touched = self.store.invalidate_session(token).await?;
        debug!(event = "session_revoked", rows = touched, "Session revoke requested");
        Ok(())
    }

    async fn require_admin(&self, token: &str) -> Result<User, AuthError> {
        let user = self.validate(token).await?;

        if !user.is_admin {
            return Err(AuthError::Forbidden);
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_email() {
        assert!(is_plausible_email("alice@example.com"));
        assert!(!is_plausible_email("alice"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("alice@localhost"));
        assert!(!is_plausible_email("al ice@example.com"));
    }
}
