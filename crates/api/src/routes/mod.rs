//! API routes

pub mod health;
pub mod payments;
pub mod webhooks;
pub mod withdrawals;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (no auth, used by the load balancer)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Gateway callbacks (authenticity checked per provider by the engine)
    let webhook_routes = Router::new()
        .route("/webhooks/asaas", post(webhooks::asaas))
        .route("/webhooks/abacatepay", post(webhooks::abacatepay))
        .route("/webhooks/suitpay", post(webhooks::suitpay))
        .route("/webhooks/suitpay/payouts", post(webhooks::suitpay_payouts))
        .route("/webhooks/secretpay", post(webhooks::secretpay))
        .route("/webhooks/faturefy", post(webhooks::faturefy));

    // Client-facing routes
    let client_routes = Router::new()
        .route("/payments/:provider/status", post(payments::poll_status))
        .route("/withdrawals", post(withdrawals::create));

    // Combine all routes
    Router::new()
        .merge(health_routes)
        .merge(webhook_routes)
        .merge(client_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
