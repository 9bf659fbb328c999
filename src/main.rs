mod account;
mod api;
mod audit;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod ledger;
mod retention;
mod server;
mod storage;

use crate::{config::ServerConfig, context::AppContext, jobs::JobScheduler};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumenforge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        version = %config.service.version,
        port = config.service.port,
        "Starting lumenforge"
    );

    let context = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(JobScheduler::new(context.clone()));
    scheduler.start();

    server::serve(context).await?;

    Ok(())
}
