//! Per-gateway status vocabularies and webhook verification

mod abacatepay;
mod asaas;
mod faturefy;
mod secretpay;
mod suitpay;

pub use abacatepay::AbacatepayGateway;
pub use asaas::AsaasGateway;
pub use faturefy::FaturefyGateway;
pub use secretpay::SecretpayGateway;
pub use suitpay::{webhook_hash as suitpay_webhook_hash, SuitpayGateway};
