//! Migrate command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_migrate(config: &Config) -> anyhow::Result<()> {
    let store = Store::connect(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let applied = store.migrate().await?;

    if applied.is_empty() {
        println!("Schema is up to date.");
    } else {
        for name in &applied {
            println!("✓ Applied {name}");
        }
    }

    Ok(())
}
