use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;

use super::session::invalidate_for_user;
use crate::db::{StoreError, now_timestamp};
use crate::entities::{prelude::*, users};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            full_name: model.full_name,
            is_active: model.is_active,
            is_admin: model.is_admin,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
        }
    }
}

/// Fields for a new user row. `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a user. When the row collides on both unique columns SQLite
    /// names `email` first, so a conflict is re-checked against the username
    /// to report that one first.
    pub async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let username = user.username.clone();

        let active = users::ActiveModel {
            username: Set(user.username),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            full_name: Set(user.full_name),
            is_active: Set(true),
            is_admin: Set(user.is_admin),
            last_login_at: Set(None),
            created_at: Set(now_timestamp()),
            ..Default::default()
        };

        let err = match active.insert(&self.conn).await {
            Ok(model) => return Ok(User::from(model)),
            Err(e) => StoreError::from_write(e, "User"),
        };

        if err.is_conflict() && self.get_by_username(&username).await?.is_some() {
            return Err(StoreError::Conflict("Username already exists".to_string()));
        }

        Err(err)
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let user = Users::find_by_id(id).one(&self.conn).await?;
        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await?;

        Ok(user.map(User::from))
    }

    /// Get user by username together with the stored password hash
    pub async fn get_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, StoreError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    pub async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let users = Users::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(users.into_iter().map(User::from).collect())
    }

    /// Apply a partial update. Deactivating a user revokes all of their
    /// sessions in the same transaction.
    pub async fn update(&self, id: i32, changes: UserUpdate) -> Result<User, StoreError> {
        let txn = self.conn.begin().await?;

        let user = Users::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("User {id}")))?;

        let deactivating = user.is_active && changes.is_active == Some(false);

        let mut active: users::ActiveModel = user.clone().into();
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(full_name) = changes.full_name {
            active.full_name = Set(Some(full_name));
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_admin) = changes.is_admin {
            active.is_admin = Set(is_admin);
        }

        let updated = if active.is_changed() {
            active
                .update(&txn)
                .await
                .map_err(|e| StoreError::from_write(e, "User"))?
        } else {
            user
        };

        if deactivating {
            invalidate_for_user(&txn, id).await?;
        }

        txn.commit().await?;
        Ok(User::from(updated))
    }

    /// Delete a user. Owned sessions go with it through the cascading foreign key.
    pub async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let txn = self.conn.begin().await?;

        let result = Users::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("User {id}")));
        }

        txn.commit().await?;
        Ok(())
    }

    /// (total, admins, active)
    pub async fn counts(&self) -> Result<(u64, u64, u64), StoreError> {
        let total = Users::find().count(&self.conn).await?;
        let admins = Users::find()
            .filter(users::Column::IsAdmin.eq(true))
            .count(&self.conn)
            .await?;
        let active = Users::find()
            .filter(users::Column::IsActive.eq(true))
            .count(&self.conn)
            .await?;

        Ok((total, admins, active))
    }
}
