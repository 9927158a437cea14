//! SinalPay Payments Library
//!
//! Payment reconciliation core: per-gateway status normalization and webhook
//! verification, the pending -> terminal transition engine with its plan
//! fan-out, active polling recovery for lost webhooks, and withdrawal
//! processing with balance refunds.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod plans;
pub mod poll;
pub mod providers;
pub mod service;
pub mod transactions;
pub mod withdrawals;

pub use config::{GatewayConfig, ProviderCredentials};
pub use engine::{ReconcileOutcome, ReconciliationEngine};
pub use error::{ReconError, ReconResult};
pub use gateway::{Gateway, GatewayRegistry};
pub use poll::PollService;
pub use service::PaymentsService;
pub use transactions::TransactionStore;
pub use withdrawals::{WithdrawalOutcome, WithdrawalService};
