//! Purge command handler

use crate::config::Config;
use crate::db::Store;
use crate::services::Scheduler;

pub async fn cmd_purge(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    let scheduler = Scheduler::new(store, config.session.clone());

    let purged = scheduler.run_once().await?;
    println!("Purged {purged} session(s).");

    Ok(())
}
