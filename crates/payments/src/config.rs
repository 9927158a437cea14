//! Gateway credentials and endpoints
//!
//! All credential lookup happens here at startup; reconciliation components
//! receive this struct at construction and never read the environment
//! themselves.

use sinalpay_shared::Provider;

use crate::error::{ReconError, ReconResult};

/// Credentials and endpoint for one payment gateway
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    /// API base URL for outbound status queries
    pub base_url: String,
    /// Primary API credential (key, token, or client id depending on gateway)
    pub api_key: String,
    /// Second credential for gateways that authenticate with an id/secret pair
    pub api_secret: Option<String>,
    /// Shared secret for webhook body-hash verification, where the gateway
    /// supports signing
    pub webhook_secret: Option<String>,
}

/// Configuration for all supported gateways
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub asaas: ProviderCredentials,
    pub abacatepay: ProviderCredentials,
    pub suitpay: ProviderCredentials,
    pub secretpay: ProviderCredentials,
    pub faturefy: ProviderCredentials,
}

impl GatewayConfig {
    /// Load gateway credentials from environment variables
    pub fn from_env() -> ReconResult<Self> {
        Ok(Self {
            asaas: ProviderCredentials {
                base_url: std::env::var("ASAAS_BASE_URL")
                    .unwrap_or_else(|_| "https://api.asaas.com/v3".to_string()),
                api_key: std::env::var("ASAAS_API_KEY")
                    .map_err(|_| ReconError::Config("ASAAS_API_KEY not set".to_string()))?,
                api_secret: None,
                webhook_secret: None,
            },
            abacatepay: ProviderCredentials {
                base_url: std::env::var("ABACATEPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.abacatepay.com/v1".to_string()),
                api_key: std::env::var("ABACATEPAY_API_KEY")
                    .map_err(|_| ReconError::Config("ABACATEPAY_API_KEY not set".to_string()))?,
                api_secret: None,
                webhook_secret: None,
            },
            // SuitPay authenticates with a client id/secret header pair and is
            // the one gateway that signs its webhooks
            suitpay: ProviderCredentials {
                base_url: std::env::var("SUITPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://ws.suitpay.app".to_string()),
                api_key: std::env::var("SUITPAY_CLIENT_ID")
                    .map_err(|_| ReconError::Config("SUITPAY_CLIENT_ID not set".to_string()))?,
                api_secret: Some(std::env::var("SUITPAY_CLIENT_SECRET").map_err(|_| {
                    ReconError::Config("SUITPAY_CLIENT_SECRET not set".to_string())
                })?),
                webhook_secret: Some(std::env::var("SUITPAY_WEBHOOK_SECRET").map_err(|_| {
                    ReconError::Config("SUITPAY_WEBHOOK_SECRET not set".to_string())
                })?),
            },
            secretpay: ProviderCredentials {
                base_url: std::env::var("SECRETPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.secretpay.com.br/v1".to_string()),
                api_key: std::env::var("SECRETPAY_API_KEY")
                    .map_err(|_| ReconError::Config("SECRETPAY_API_KEY not set".to_string()))?,
                api_secret: None,
                webhook_secret: None,
            },
            faturefy: ProviderCredentials {
                base_url: std::env::var("FATUREFY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.faturefy.com.br/v1".to_string()),
                api_key: std::env::var("FATUREFY_API_KEY")
                    .map_err(|_| ReconError::Config("FATUREFY_API_KEY not set".to_string()))?,
                api_secret: None,
                webhook_secret: None,
            },
        })
    }

    /// Credentials for one gateway
    pub fn credentials(&self, provider: Provider) -> &ProviderCredentials {
        match provider {
            Provider::Asaas => &self.asaas,
            Provider::Abacatepay => &self.abacatepay,
            Provider::Suitpay => &self.suitpay,
            Provider::Secretpay => &self.secretpay,
            Provider::Faturefy => &self.faturefy,
        }
    }
}
