//! Asaas gateway integration
//!
//! Asaas reports charge status both in webhook events (`PAYMENT_RECEIVED`,
//! `PAYMENT_CONFIRMED`, ...) and as a `status` field on the payment object
//! (`RECEIVED`, `CONFIRMED`, ...). Both vocabularies are accepted here.

use sinalpay_shared::TransactionState;

use crate::gateway::Gateway;

pub struct AsaasGateway;

impl Gateway for AsaasGateway {
    fn normalize_status(&self, token: &str) -> TransactionState {
        match token.to_uppercase().as_str() {
            "RECEIVED" | "CONFIRMED" | "RECEIVED_IN_CASH" | "PAYMENT_RECEIVED"
            | "PAYMENT_CONFIRMED" => TransactionState::Paid,
            "OVERDUE"
            | "REFUNDED"
            | "REFUND_REQUESTED"
            | "REFUND_IN_PROGRESS"
            | "CHARGEBACK_REQUESTED"
            | "CHARGEBACK_DISPUTE"
            | "AWAITING_CHARGEBACK_REVERSAL"
            | "PAYMENT_OVERDUE"
            | "PAYMENT_DELETED"
            | "PAYMENT_REFUNDED"
            | "PAYMENT_CHARGEBACK_REQUESTED" => TransactionState::Failed,
            // PENDING, AWAITING_RISK_ANALYSIS and anything unrecognized
            _ => TransactionState::Pending,
        }
    }

    /// Asaas has no webhook signing scheme; authenticity relies on the
    /// endpoint not being guessable. Known trust gap.
    fn verify(&self, _body: &serde_json::Value) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_vocabulary() {
        let gw = AsaasGateway;
        assert_eq!(gw.normalize_status("RECEIVED"), TransactionState::Paid);
        assert_eq!(gw.normalize_status("CONFIRMED"), TransactionState::Paid);
        assert_eq!(
            gw.normalize_status("PAYMENT_RECEIVED"),
            TransactionState::Paid
        );
        // case-insensitive
        assert_eq!(gw.normalize_status("received"), TransactionState::Paid);
    }

    #[test]
    fn test_failed_vocabulary() {
        let gw = AsaasGateway;
        assert_eq!(gw.normalize_status("OVERDUE"), TransactionState::Failed);
        assert_eq!(gw.normalize_status("REFUNDED"), TransactionState::Failed);
        assert_eq!(
            gw.normalize_status("CHARGEBACK_REQUESTED"),
            TransactionState::Failed
        );
    }

    #[test]
    fn test_unknown_tokens_stay_pending() {
        let gw = AsaasGateway;
        assert_eq!(gw.normalize_status("PENDING"), TransactionState::Pending);
        assert_eq!(
            gw.normalize_status("AWAITING_RISK_ANALYSIS"),
            TransactionState::Pending
        );
        assert_eq!(gw.normalize_status("WAT"), TransactionState::Pending);
        assert_eq!(gw.normalize_status(""), TransactionState::Pending);
    }

    #[test]
    fn test_verify_is_trust_gap_noop() {
        let gw = AsaasGateway;
        assert!(gw.verify(&serde_json::json!({"anything": true})));
    }
}
