use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IssuedTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IssuedTokens::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IssuedTokens::Token)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(IssuedTokens::IssuedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        // Tokens of sessions that predate the ledger are already spent.
        manager
            .get_connection()
            .execute_unprepared(
                "INSERT OR IGNORE INTO issued_tokens (token, issued_at) \
                 SELECT session_token, created_at FROM sessions",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IssuedTokens::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum IssuedTokens {
    Table,
    Id,
    Token,
    IssuedAt,
}
