//! SinalPay API Library
//!
//! This crate contains the HTTP components of SinalPay: gateway webhook
//! receivers, the payment status poll endpoint and withdrawal creation.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
