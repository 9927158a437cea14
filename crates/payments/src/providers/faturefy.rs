//! Faturefy (PayLatam) gateway integration

use serde_json::Value;
use sinalpay_shared::TransactionState;

use crate::gateway::Gateway;

pub struct FaturefyGateway;

impl Gateway for FaturefyGateway {
    fn normalize_status(&self, token: &str) -> TransactionState {
        match token.to_uppercase().as_str() {
            "APPROVED" | "PAID" | "COMPLETED" => TransactionState::Paid,
            "REFUSED" | "CANCELED" | "CANCELLED" | "REFUNDED" | "CHARGEDBACK" | "EXPIRED" => {
                TransactionState::Failed
            }
            // PENDING, WAITING_PAYMENT and anything unrecognized
            _ => TransactionState::Pending,
        }
    }

    /// Faturefy webhooks carry no signature. Known trust gap.
    fn verify(&self, _body: &Value) -> bool {
        true
    }
}
