//! Reconciliation error types

use rust_decimal::Decimal;
use thiserror::Error;

/// Reconciliation-specific errors
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(String),

    #[error("Webhook authenticity check failed for {0}")]
    AuthenticationFailed(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReconError {
    /// Whether retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReconError::ProviderUnavailable(_))
    }
}

impl From<sqlx::Error> for ReconError {
    fn from(err: sqlx::Error) -> Self {
        ReconError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for ReconError {
    fn from(err: reqwest::Error) -> Self {
        ReconError::ProviderUnavailable(err.to_string())
    }
}

pub type ReconResult<T> = Result<T, ReconError>;
