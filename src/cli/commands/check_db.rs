//! Database health command handler

use anyhow::Context;

use crate::config::Config;
use crate::db::{DbHealthReport, Store};

pub async fn cmd_check_db(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = Store::connect(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    store.ping().await.context("Database did not answer")?;

    let report = store
        .health_report()
        .await
        .context("Failed to collect database statistics")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&config.general.database_path, &report);
    }

    if report.orphaned_sessions > 0 {
        anyhow::bail!(
            "{} session(s) reference missing users",
            report.orphaned_sessions
        );
    }

    Ok(())
}

fn print_report(database: &str, report: &DbHealthReport) {
    println!("Database: {database}");
    println!("{:-<50}", "");
    println!(
        "Users:      {} total, {} active, {} admin",
        report.total_users, report.active_users, report.admin_users
    );
    println!(
        "Sessions:   {} total, {} valid, {} active",
        report.total_sessions, report.valid_sessions, report.active_sessions
    );
    println!("{:-<50}", "");

    if report.orphaned_sessions == 0 {
        println!("✓ No orphaned sessions");
    } else {
        println!("✗ {} orphaned session(s)", report.orphaned_sessions);
    }

    if report.expired_valid_sessions > 0 {
        println!(
            "• {} expired session(s) still flagged valid (run `authkeep purge`)",
            report.expired_valid_sessions
        );
    }

    if report.admin_users == 0 {
        println!("• No admin users (create one with `authkeep create-user --admin`)");
    }
}
