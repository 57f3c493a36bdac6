//! Create user command handler

use anyhow::Context;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, NewAccount, SeaOrmAuthService};

pub const PASSWORD_ENV: &str = "AUTHKEEP_PASSWORD";

pub async fn cmd_create_user(
    config: &Config,
    username: &str,
    email: &str,
    full_name: Option<String>,
    admin: bool,
) -> anyhow::Result<()> {
    let password = std::env::var(PASSWORD_ENV)
        .with_context(|| format!("Set {PASSWORD_ENV} to the new user's password"))?;

    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    let auth = SeaOrmAuthService::new(store, config.security.clone(), config.session.clone());

    let user = auth
        .create_user(
            NewAccount {
                username: username.to_string(),
                email: email.to_string(),
                password,
                full_name,
            },
            admin,
        )
        .await?;

    println!(
        "✓ Created {} '{}' (id {})",
        if user.is_admin { "admin" } else { "user" },
        user.username,
        user.id
    );

    Ok(())
}
