use sea_orm_migration::prelude::*;

mod m20240101_create_users;
mod m20240102_create_sessions;
mod m20240201_add_is_admin;
mod m20240301_create_issued_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_create_users::Migration),
            Box::new(m20240102_create_sessions::Migration),
            Box::new(m20240201_add_is_admin::Migration),
            Box::new(m20240301_create_issued_tokens::Migration),
        ]
    }
}
