use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SessionConfig;
use crate::db::Store;

/// Background job that deletes revoked and expired sessions.
pub struct Scheduler {
    store: Store,
    config: SessionConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(store: Store, config: SessionConfig) -> Self {
        Self {
            store,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.purge_enabled {
            info!("Session purge is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting session purge scheduler");

        if let Some(cron_expr) = &self.config.purge_cron {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let store = self.store.clone();
        let running = Arc::clone(&self.running);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let store = store.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                purge_job(&store).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Session purge scheduled with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.purge_interval_minutes.max(1);
        info!("Session purge running every {}m", interval_mins);

        let mut purge_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));

        loop {
            purge_interval.tick().await;
            if !*self.running.read().await {
                break;
            }
            purge_job(&self.store).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping session purge scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Purge once, now. Returns the number of deleted sessions.
    pub async fn run_once(&self) -> Result<u64> {
        let purged = self.store.purge_sessions(Utc::now()).await?;
        metrics::counter!("auth_sessions_purged_total").increment(purged);
        info!(event = "sessions_purged", purged, "Manual session purge finished");
        Ok(purged)
    }
}

async fn purge_job(store: &Store) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "purge_sessions", "Starting scheduled session purge");

    match store.purge_sessions(Utc::now()).await {
        Ok(purged) => {
            metrics::counter!("auth_sessions_purged_total").increment(purged);
            info!(
                event = "job_finished",
                job_name = "purge_sessions",
                purged,
                duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Scheduled session purge finished"
            );
        }
        Err(e) => {
            error!(event = "job_failed", job_name = "purge_sessions", error = %e, "Scheduled session purge failed");
        }
    }
}
