//! Provider abstraction
//!
//! Each gateway exposes exactly the two capabilities reconciliation needs:
//! mapping its status vocabulary into the internal state set, and checking
//! that a webhook body really came from it. The engine is provider-agnostic
//! and only calls through this interface.

use sinalpay_shared::{Provider, TransactionState};

use crate::config::GatewayConfig;
use crate::providers::{
    AbacatepayGateway, AsaasGateway, FaturefyGateway, SecretpayGateway, SuitpayGateway,
};

/// The two reconciliation capabilities of a payment gateway
pub trait Gateway: Send + Sync {
    /// Map a provider status token into the internal state set.
    ///
    /// Total per provider: unrecognized tokens map to `Pending`, never to
    /// `Paid`, so a garbage status can never grant a plan. Explicit
    /// failure/cancellation/chargeback/refund vocabulary maps to `Failed`.
    fn normalize_status(&self, token: &str) -> TransactionState;

    /// Check that a webhook body originated from this gateway.
    ///
    /// Gateways without a signing scheme return `true` unconditionally; that
    /// trust gap is documented on each such implementation and the webhook
    /// endpoint relies on network isolation instead.
    fn verify(&self, body: &serde_json::Value) -> bool;
}

/// Dispatch table over all supported gateways, keyed by [`Provider`]
///
/// Built once from [`GatewayConfig`] and shared across the engine, the
/// poller, and the withdrawal reconciler.
pub struct GatewayRegistry {
    asaas: AsaasGateway,
    abacatepay: AbacatepayGateway,
    suitpay: SuitpayGateway,
    secretpay: SecretpayGateway,
    faturefy: FaturefyGateway,
}

impl GatewayRegistry {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            asaas: AsaasGateway,
            abacatepay: AbacatepayGateway,
            suitpay: SuitpayGateway::new(config.suitpay.webhook_secret.clone()),
            secretpay: SecretpayGateway,
            faturefy: FaturefyGateway,
        }
    }

    /// Look up the gateway for a provider; total over the enum
    pub fn get(&self, provider: Provider) -> &dyn Gateway {
        match provider {
            Provider::Asaas => &self.asaas,
            Provider::Abacatepay => &self.abacatepay,
            Provider::Suitpay => &self.suitpay,
            Provider::Secretpay => &self.secretpay,
            Provider::Faturefy => &self.faturefy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredentials;

    fn test_config() -> GatewayConfig {
        let blank = ProviderCredentials {
            base_url: "http://localhost".to_string(),
            api_key: "k".to_string(),
            api_secret: None,
            webhook_secret: None,
        };
        GatewayConfig {
            asaas: blank.clone(),
            abacatepay: blank.clone(),
            suitpay: ProviderCredentials {
                webhook_secret: Some("secret".to_string()),
                ..blank.clone()
            },
            secretpay: blank.clone(),
            faturefy: blank,
        }
    }

    #[test]
    fn test_registry_covers_every_provider() {
        let registry = GatewayRegistry::new(&test_config());
        for provider in Provider::ALL {
            // unknown garbage must normalize to pending for every gateway
            let state = registry.get(provider).normalize_status("___garbage___");
            assert_eq!(state, TransactionState::Pending);
        }
    }

    #[test]
    fn test_trait_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn Gateway) {}
        let registry = GatewayRegistry::new(&test_config());
        _accepts_dyn(registry.get(Provider::Asaas));
    }
}
