use sea_orm_migration::prelude::*;
use tracing::info;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.has_column("users", "is_admin").await? {
            info!("users.is_admin already present, skipping column add");
        } else {
            manager
                .alter_table(
                    Table::alter()
                        .table(Users::Table)
                        .add_column(
                            ColumnDef::new(Users::IsAdmin)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_is_admin")
                    .table(Users::Table)
                    .col(Users::IsAdmin)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .if_exists()
                    .name("idx_users_is_admin")
                    .table(Users::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Users::Table)
                    .drop_column(Users::IsAdmin)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    IsAdmin,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::MigratorTrait;
    use sea_orm_migration::sea_orm::{
        ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement,
    };

    async fn single_connection() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        Database::connect(opt).await.unwrap()
    }

    async fn count_is_admin_columns(conn: &DatabaseConnection) -> usize {
        let rows = conn
            .query_all(Statement::from_string(
                conn.get_database_backend(),
                "PRAGMA table_info(users)",
            ))
            .await
            .unwrap();

        rows.iter()
            .filter(|row| row.try_get::<String>("", "name").unwrap() == "is_admin")
            .count()
    }

    #[tokio::test]
    async fn test_add_is_admin_twice_keeps_one_column() {
        let conn = single_connection().await;

        // users + sessions tables only
        super::super::Migrator::up(&conn, Some(2)).await.unwrap();

        conn.execute_unprepared(
            "INSERT INTO users (username, email, password_hash, is_active, created_at) \
             VALUES ('alice', 'alice@example.com', 'x', 1, '2024-01-01T00:00:00.000000Z'), \
                    ('bob', 'bob@example.com', 'x', 0, '2024-01-01T00:00:00.000000Z')",
        )
        .await
        .unwrap();

        let manager = SchemaManager::new(&conn);
        Migration.up(&manager).await.unwrap();
        Migration.up(&manager).await.unwrap();

        assert_eq!(count_is_admin_columns(&conn).await, 1);

        let rows = conn
            .query_all(Statement::from_string(
                conn.get_database_backend(),
                "SELECT username, is_active, is_admin FROM users ORDER BY username",
            ))
            .await
            .unwrap();

        let values: Vec<(String, bool, bool)> = rows
            .iter()
            .map(|row| {
                (
                    row.try_get("", "username").unwrap(),
                    row.try_get("", "is_active").unwrap(),
                    row.try_get("", "is_admin").unwrap(),
                )
            })
            .collect();

        assert_eq!(
            values,
            vec![
                ("alice".to_string(), true, false),
                ("bob".to_string(), false, false),
            ]
        );
    }

    #[tokio::test]
    async fn test_migrator_rerun_is_noop() {
        let conn = single_connection().await;

        super::super::Migrator::up(&conn, None).await.unwrap();
        super::super::Migrator::up(&conn, None).await.unwrap();

        assert!(
            super::super::Migrator::get_pending_migrations(&conn)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(count_is_admin_columns(&conn).await, 1);
    }
}
