//! AbacatePay gateway integration
//!
//! AbacatePay delivers `{ event, data }` webhooks (`billing.paid`) and a
//! `status` field on billing objects (`PAID`, `PENDING`, `EXPIRED`, ...).

use sinalpay_shared::TransactionState;

use crate::gateway::Gateway;

pub struct AbacatepayGateway;

impl Gateway for AbacatepayGateway {
    fn normalize_status(&self, token: &str) -> TransactionState {
        match token.to_uppercase().as_str() {
            "PAID" | "COMPLETED" | "BILLING.PAID" => TransactionState::Paid,
            "EXPIRED" | "CANCELLED" | "CANCELED" | "REFUNDED" | "BILLING.FAILED" => {
                TransactionState::Failed
            }
            // PENDING and anything unrecognized
            _ => TransactionState::Pending,
        }
    }

    /// AbacatePay has no webhook signing scheme. Known trust gap.
    fn verify(&self, _body: &serde_json::Value) -> bool {
        true
    }
}
