use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr, Statement,
};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::session::{Session, SessionSummary};
pub use repositories::user::{NewUser, User, UserUpdate};

/// Errors surfaced by the storage layer.
///
/// Constraint names never leave this module: unique and foreign key
/// violations are folded into [`StoreError::Conflict`] and
/// [`StoreError::NotFound`] with a caller-safe message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbErr),
}

impl StoreError {
    /// Classify a failed write. `entity` names the row being written.
    pub(crate) fn from_write(err: DbErr, entity: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                Self::Conflict(conflict_message(entity, &detail))
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                Self::NotFound(format!("{entity} references a missing row"))
            }
            _ => Self::Storage(err),
        }
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

fn conflict_message(entity: &str, detail: &str) -> String {
    let detail = detail.to_lowercase();
    if detail.contains("username") {
        "Username already exists".to_string()
    } else if detail.contains("email") {
        "Email already exists".to_string()
    } else if detail.contains("session_token") || detail.contains("issued_tokens") {
        "Session token already issued".to_string()
    } else {
        format!("{entity} already exists")
    }
}

/// Fixed-width UTC timestamp, so lexical order in SQL matches time order.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[must_use]
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Snapshot of schema health, mirrors what `check-db` prints.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DbHealthReport {
    pub total_users: u64,
    pub admin_users: u64,
    pub active_users: u64,
    pub total_sessions: u64,
    pub valid_sessions: u64,
    pub active_sessions: u64,
    pub orphaned_sessions: u64,
    pub expired_valid_sessions: u64,
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        let store = Self::connect(db_url, max_connections, min_connections).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Open the pool without touching the schema.
    pub async fn connect(db_url: &str, max_connections: u32, min_connections: u32) -> Result<Self> {
        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every in-memory connection is its own database.
        let (max_connections, min_connections) = if db_url.contains(":memory:") {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        let store = Self { conn };

        info!(
            "Database connected (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(store)
    }

    /// Apply pending migrations. Already-applied versions are skipped.
    pub async fn migrate(&self) -> Result<Vec<String>> {
        use sea_orm_migration::MigratorTrait;

        let pending: Vec<String> = migrator::Migrator::get_pending_migrations(&self.conn)
            .await?
            .iter()
            .map(|m| m.name().to_string())
            .collect();

        if pending.is_empty() {
            info!(event = "migrations_skipped", "Schema is up to date, nothing to apply");
            return Ok(pending);
        }

        migrator::Migrator::up(&self.conn, None).await?;
        info!(
            event = "migrations_applied",
            count = pending.len(),
            migrations = ?pending,
            "Applied pending migrations"
        );

        Ok(pending)
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn session_repo(&self) -> repositories::session::SessionRepository {
        repositories::session::SessionRepository::new(self.conn.clone())
    }

    pub async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        self.user_repo().create(user).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, StoreError> {
        self.user_repo().get_by_username_with_password(username).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.user_repo().list_all().await
    }

    pub async fn update_user(&self, id: i32, changes: UserUpdate) -> Result<User, StoreError> {
        self.user_repo().update(id, changes).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<(), StoreError> {
        self.user_repo().delete(id).await
    }

    pub async fn create_session(
        &self,
        user_id: i32,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        self.session_repo().create(user_id, token, expires_at).await
    }

    pub async fn record_login(
        &self,
        user_id: i32,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        self.session_repo()
            .record_login(user_id, token, expires_at)
            .await
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.session_repo().get_by_token(token).await
    }

    pub async fn get_session_with_user(
        &self,
        token: &str,
    ) -> Result<Option<(Session, User)>, StoreError> {
        self.session_repo().get_with_user(token).await
    }

    pub async fn invalidate_session(&self, token: &str) -> Result<u64, StoreError> {
        self.session_repo().invalidate(token).await
    }

    pub async fn invalidate_session_by_id(&self, id: i32) -> Result<(), StoreError> {
        self.session_repo().invalidate_by_id(id).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.session_repo().list_with_users().await
    }

    pub async fn purge_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.session_repo().purge(now).await
    }

    pub async fn health_report(&self) -> Result<DbHealthReport, StoreError> {
        let now = Utc::now();
        let (total_users, admin_users, active_users) = self.user_repo().counts().await?;
        let sessions = self.session_repo();
        let counts = sessions.counts(now).await?;

        Ok(DbHealthReport {
            total_users,
            admin_users,
            active_users,
            total_sessions: counts.total,
            valid_sessions: counts.valid,
            active_sessions: counts.active,
            orphaned_sessions: sessions.count_orphaned().await?,
            expired_valid_sessions: counts.expired_valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);

        let a = format_timestamp(early);
        let b = format_timestamp(late);

        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&b), Some(late));
    }

    #[test]
    fn test_conflict_message_hides_constraint_names() {
        let msg = conflict_message("User", "UNIQUE constraint failed: users.email");
        assert_eq!(msg, "Email already exists");

        let msg = conflict_message("Session", "UNIQUE constraint failed: sessions.session_token");
        assert_eq!(msg, "Session token already issued");

        let msg = conflict_message("Session", "UNIQUE constraint failed: issued_tokens.token");
        assert_eq!(msg, "Session token already issued");
    }
}
