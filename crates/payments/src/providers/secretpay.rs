//! SecretPay gateway integration
//!
//! SecretPay reports status in Portuguese and lowercase, so normalization
//! folds case down instead of up.

use serde_json::Value;
use sinalpay_shared::TransactionState;

use crate::gateway::Gateway;

pub struct SecretpayGateway;

impl Gateway for SecretpayGateway {
    fn normalize_status(&self, token: &str) -> TransactionState {
        match token.to_lowercase().as_str() {
            "aprovado" | "approved" | "paid" | "pago" => TransactionState::Paid,
            "recusado" | "cancelado" | "estornado" | "expirado" | "refused" | "canceled"
            | "refunded" | "expired" => TransactionState::Failed,
            // pendente, aguardando_pagamento and anything unrecognized
            _ => TransactionState::Pending,
        }
    }

    /// SecretPay webhooks carry no signature. Known trust gap.
    fn verify(&self, _body: &Value) -> bool {
        true
    }
}
