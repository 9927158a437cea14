//! SinalPay background worker
//!
//! Two scheduled jobs: re-polling pending transactions the gateways never
//! called back about, and pruning the gateway event audit log.

use std::sync::Arc;

use anyhow::Context;
use sinalpay_payments::PaymentsService;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = sinalpay_shared::create_pool(&database_url).await?;

    let payments = Arc::new(PaymentsService::from_env(pool)?);

    let mut scheduler = JobScheduler::new().await?;

    // Re-poll stale pending transactions every 5 minutes
    let sweep_service = Arc::clone(&payments);
    scheduler
        .add(Job::new_async("0 */5 * * * *", move |_id, _sched| {
            let payments = Arc::clone(&sweep_service);
            Box::pin(async move {
                sweeper::sweep_stale_pending(&payments).await;
            })
        })?)
        .await?;

    // Prune old gateway events daily at 03:10 UTC
    let prune_service = Arc::clone(&payments);
    scheduler
        .add(Job::new_async("0 10 3 * * *", move |_id, _sched| {
            let payments = Arc::clone(&prune_service);
            Box::pin(async move {
                sweeper::prune_gateway_events(&payments).await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("SinalPay worker started");

    shutdown_signal().await;
    scheduler.shutdown().await?;

    Ok(())
}

/// Structured JSON logs when LOG_FORMAT=json, human-readable otherwise
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sinalpay_worker=info,sinalpay_payments=info".into());

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[allow(clippy::expect_used)] // Signal handler installation failure is a fatal system error
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping worker...");
}
