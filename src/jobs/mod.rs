/// Background job scheduler
///
/// Long-running maintenance loops driven by `tokio::time::interval`. Each
/// job runs on its own task; a failed pass is logged and retried on the
/// next tick.
pub mod tasks;

use crate::context::AppContext;
use std::sync::Arc;
use std::time::Duration;

const HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

/// Job scheduler for periodic maintenance
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_retention_sweep().await;
        });

        let scheduler = self;
        tokio::spawn(async move {
            scheduler.run_health_check().await;
        });

        tracing::info!("Background jobs started");
    }

    /// Periodic expired asset sweep
    async fn run_retention_sweep(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(
            self.context.config.retention.sweep_interval_secs,
        ));

        loop {
            interval.tick().await;

            match tasks::sweep_expired_assets(&self.context).await {
                Ok(_) => {
                    tracing::debug!("Retention sweep pass complete");
                }
                Err(e) => {
                    tracing::error!("Retention sweep pass failed: {}", e);
                }
            }
        }
    }

    /// Periodic database health check
    async fn run_health_check(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&self.context).await {
                tracing::error!("Health check failed: {}", e);
            }
        }
    }
}
