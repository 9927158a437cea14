//! Facade wiring the reconciliation components together

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::GatewayConfig;
use crate::engine::ReconciliationEngine;
use crate::error::ReconResult;
use crate::events::GatewayEventLogger;
use crate::gateway::GatewayRegistry;
use crate::poll::PollService;
use crate::withdrawals::WithdrawalService;

/// Everything the API server and the worker need to reconcile payments.
pub struct PaymentsService {
    engine: Arc<ReconciliationEngine>,
    poller: PollService,
    withdrawals: WithdrawalService,
    events: GatewayEventLogger,
}

impl PaymentsService {
    pub fn new(config: GatewayConfig, pool: PgPool) -> Self {
        let registry = Arc::new(GatewayRegistry::new(&config));
        let engine = Arc::new(ReconciliationEngine::new(pool.clone(), Arc::clone(&registry)));
        let poller = PollService::new(Arc::clone(&engine), config);
        let withdrawals = WithdrawalService::new(pool.clone(), registry);
        let events = GatewayEventLogger::new(pool);

        Self {
            engine,
            poller,
            withdrawals,
            events,
        }
    }

    /// Create the service from environment variables.
    pub fn from_env(pool: PgPool) -> ReconResult<Self> {
        let config = GatewayConfig::from_env()?;
        Ok(Self::new(config, pool))
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    pub fn poller(&self) -> &PollService {
        &self.poller
    }

    pub fn withdrawals(&self) -> &WithdrawalService {
        &self.withdrawals
    }

    pub fn events(&self) -> &GatewayEventLogger {
        &self.events
    }
}
