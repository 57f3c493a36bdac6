use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
    sea_query::Expr,
};
use serde::Serialize;

use super::user::User;
use crate::db::{StoreError, format_timestamp, now_timestamp, parse_timestamp};
use crate::entities::{issued_tokens, prelude::*, sessions, users};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: i32,
    pub user_id: i32,
    #[serde(skip_serializing)]
    pub session_token: String,
    pub expires_at: String,
    pub created_at: String,
    pub is_valid: bool,
}

impl Session {
    /// Expiry as a timestamp. An unparseable value counts as already expired.
    #[must_use]
    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        parse_timestamp(&self.expires_at).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at_utc()
    }
}

impl From<sessions::Model> for Session {
    fn from(model: sessions::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            session_token: model.session_token,
            expires_at: model.expires_at,
            created_at: model.created_at,
            is_valid: model.is_valid,
        }
    }
}

/// Session row joined with its owner's username, for admin listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub created_at: String,
    pub expires_at: String,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCounts {
    pub total: u64,
    pub valid: u64,
    pub active: u64,
    pub expired_valid: u64,
}

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a session. The foreign key rejects unknown users and the
    /// issued-token ledger rejects any token handed out before, purged or not.
    pub async fn create(
        &self,
        user_id: i32,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let txn = self.conn.begin().await?;
        let session = insert_session(&txn, user_id, token, expires_at).await?;
        txn.commit().await?;
        Ok(session)
    }

    /// Stamp `last_login_at` and issue the session in one transaction.
    pub async fn record_login(
        &self,
        user_id: i32,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let txn = self.conn.begin().await?;

        let stamped = Users::update_many()
            .col_expr(users::Column::LastLoginAt, Expr::value(now_timestamp()))
            .filter(users::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;

        if stamped.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("User {user_id}")));
        }

        let session = insert_session(&txn, user_id, token, expires_at).await?;

        txn.commit().await?;
        Ok(session)
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let session = Sessions::find()
            .filter(sessions::Column::SessionToken.eq(token))
            .one(&self.conn)
            .await?;

        Ok(session.map(Session::from))
    }

    /// Session and owner in one indexed read.
    pub async fn get_with_user(&self, token: &str) -> Result<Option<(Session, User)>, StoreError> {
        let row = Sessions::find()
            .filter(sessions::Column::SessionToken.eq(token))
            .find_also_related(Users)
            .one(&self.conn)
            .await?;

        Ok(row.and_then(|(session, user)| {
            user.map(|user| (Session::from(session), User::from(user)))
        }))
    }

    /// Mark a session invalid. Returns the number of rows touched; zero is not an error.
    pub async fn invalidate(&self, token: &str) -> Result<u64, StoreError> {
        let result = Sessions::update_many()
            .col_expr(sessions::Column::IsValid, Expr::value(false))
            .filter(sessions::Column::SessionToken.eq(token))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn invalidate_by_id(&self, id: i32) -> Result<(), StoreError> {
        let session = Sessions::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Session {id}")))?;

        if session.is_valid {
            let mut active: sessions::ActiveModel = session.into();
            active.is_valid = Set(false);
            active.update(&self.conn).await?;
        }

        Ok(())
    }

    pub async fn list_with_users(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let rows = Sessions::find()
            .find_also_related(Users)
            .order_by_desc(sessions::Column::CreatedAt)
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(session, user)| SessionSummary {
                id: session.id,
                user_id: session.user_id,
                username: user.map_or_else(|| "Unknown".to_string(), |u| u.username),
                created_at: session.created_at,
                expires_at: session.expires_at,
                is_valid: session.is_valid,
            })
            .collect())
    }

    /// Delete sessions that can no longer authenticate: revoked, or expired at `now`.
    /// Their tokens stay in `issued_tokens`.
    pub async fn purge(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = Sessions::delete_many()
            .filter(
                Condition::any()
                    .add(sessions::Column::IsValid.eq(false))
                    .add(sessions::Column::ExpiresAt.lte(format_timestamp(now))),
            )
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn counts(&self, now: DateTime<Utc>) -> Result<SessionCounts, StoreError> {
        let now = format_timestamp(now);

        let total = Sessions::find().count(&self.conn).await?;
        let valid = Sessions::find()
            .filter(sessions::Column::IsValid.eq(true))
            .count(&self.conn)
            .await?;
        let active = Sessions::find()
            .filter(sessions::Column::IsValid.eq(true))
            .filter(sessions::Column::ExpiresAt.gt(now.clone()))
            .count(&self.conn)
            .await?;
        let expired_valid = Sessions::find()
            .filter(sessions::Column::IsValid.eq(true))
            .filter(sessions::Column::ExpiresAt.lte(now))
            .count(&self.conn)
            .await?;

        Ok(SessionCounts {
            total,
            valid,
            active,
            expired_valid,
        })
    }

    /// Sessions whose owner row is gone. Always zero while the foreign key holds.
    pub async fn count_orphaned(&self) -> Result<u64, StoreError> {
        let backend = self.conn.get_database_backend();
        let row = self
            .conn
            .query_one(Statement::from_string(
                backend,
                "SELECT COUNT(*) AS orphaned FROM sessions s \
                 LEFT JOIN users u ON s.user_id = u.id \
                 WHERE u.id IS NULL",
            ))
            .await?;

        let count: i64 = match row {
            Some(row) => row.try_get("", "orphaned")?,
            None => 0,
        };

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

async fn insert_session<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<Session, StoreError> {
    let created_at = now_timestamp();

    issued_tokens::ActiveModel {
        token: Set(token.to_string()),
        issued_at: Set(created_at.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| StoreError::from_write(e, "Session"))?;

    let active = sessions::ActiveModel {
        user_id: Set(user_id),
        session_token: Set(token.to_string()),
        expires_at: Set(format_timestamp(expires_at)),
        created_at: Set(created_at),
        is_valid: Set(true),
        ..Default::default()
    };

    let model = active
        .insert(db)
        .await
        .map_err(|e| StoreError::from_write(e, "Session"))?;

    Ok(Session::from(model))
}

pub(crate) async fn invalidate_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<u64, StoreError> {
    let result = Sessions::update_many()
        .col_expr(sessions::Column::IsValid, Expr::value(false))
        .filter(sessions::Column::UserId.eq(user_id))
        .filter(sessions::Column::IsValid.eq(true))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
