//! SinalPay API server

use sinalpay_api::{routes::create_router, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (development convenience)
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let bind_address = config.bind_address.clone();

    // Create the connection pool and bring the schema up to date
    let pool = sinalpay_shared::create_pool(&config.database_url).await?;
    sinalpay_shared::run_migrations(&pool).await?;

    let state = AppState::new(config, pool);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("SinalPay API listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Structured JSON logs when LOG_FORMAT=json, human-readable otherwise
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sinalpay_api=info,sinalpay_payments=info,tower_http=info".into());

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
    tracing::info!("Shutdown signal received, stopping server...");
}
