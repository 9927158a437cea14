//! Shared application state

use std::sync::Arc;

use sinalpay_payments::PaymentsService;
use sqlx::PgPool;

use crate::config::Config;

/// State shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub payments: Arc<PaymentsService>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let payments = Arc::new(PaymentsService::new(config.gateway.clone(), pool.clone()));
        Self {
            pool,
            config: Arc::new(config),
            payments,
        }
    }
}
