//! SuitPay gateway integration
//!
//! SuitPay is the one gateway that signs its webhooks: the body carries a
//! `hash` field computed as SHA-256 over `requestNumber` + `statusTransaction`
//! concatenated with the shared webhook secret, hex encoded. A mismatch must
//! reject the webhook before any state mutation.

use serde_json::Value;
use sha2::{Digest, Sha256};
use sinalpay_shared::TransactionState;

use crate::gateway::Gateway;

/// Compute the body hash SuitPay embeds in its webhooks
///
/// SHA-256 over `requestNumber` + `statusTransaction` + shared secret,
/// hex encoded. Fields absent from the payload enter as empty strings.
pub fn webhook_hash(request_number: &str, status_token: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request_number.as_bytes());
    hasher.update(status_token.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct SuitpayGateway {
    webhook_secret: Option<String>,
}

impl SuitpayGateway {
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self { webhook_secret }
    }
}

impl Gateway for SuitpayGateway {
    fn normalize_status(&self, token: &str) -> TransactionState {
        match token.to_uppercase().as_str() {
            "PAID_OUT" | "PAYED_OUT" | "PAID" => TransactionState::Paid,
            "CANCELED" | "CANCELLED" | "UNDONE" | "CHARGEBACK" | "ERROR" => {
                TransactionState::Failed
            }
            // WAITING_FOR_APPROVAL and anything unrecognized
            _ => TransactionState::Pending,
        }
    }

    fn verify(&self, body: &Value) -> bool {
        // No configured secret: fail closed rather than accept anything
        let secret = match self.webhook_secret.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => return false,
        };
        let hash = match body.get("hash").and_then(Value::as_str) {
            Some(h) => h,
            None => return false,
        };
        let request_number = body
            .get("requestNumber")
            .and_then(Value::as_str)
            .unwrap_or("");
        let status_token = body
            .get("statusTransaction")
            .and_then(Value::as_str)
            .unwrap_or("");

        let expected = webhook_hash(request_number, status_token, secret);
        hash.eq_ignore_ascii_case(&expected)
    }
}
