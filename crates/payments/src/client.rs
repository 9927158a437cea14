//! HTTP client for gateway status queries
//!
//! Polling is a recovery path, not a hot path, so the client favors
//! robustness: a hard per-attempt timeout, a couple of jittered retries for
//! transient failures, and no retry at all for responses that will not get
//! better (4xx, non-JSON bodies).

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::error::{ReconError, ReconResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(2);
const MAX_RETRIES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Get,
    Post,
}

/// One named way of asking a gateway about a transaction.
///
/// Gateways disagree about which identifier their status endpoint wants, so
/// each provider exposes several probes tried in order. The name shows up in
/// logs when a probe succeeds.
pub struct StatusProbe {
    pub name: &'static str,
    pub method: ProbeMethod,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

pub struct GatewayHttpClient {
    client: Client,
}

impl Default for GatewayHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayHttpClient {
    #[allow(clippy::expect_used)] // HTTP client creation failure is a fatal system error
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Execute a probe and parse the JSON body.
    ///
    /// Retries transient failures with exponential backoff and jitter.
    /// A 4xx just means this strategy does not fit the identifier, so the
    /// caller should move on to the next probe instead of waiting.
    pub async fn execute(&self, probe: &StatusProbe) -> ReconResult<Value> {
        let retry_strategy = ExponentialBackoff::from_millis(RETRY_BASE_DELAY.as_millis() as u64)
            .max_delay(RETRY_MAX_DELAY)
            .take(MAX_RETRIES)
            .map(jitter);

        Retry::spawn(retry_strategy, || async {
            let result = self.execute_once(probe).await;

            match &result {
                Ok(_) => Ok(result),
                Err(e) if e.is_transient() => {
                    tracing::debug!(
                        probe = probe.name,
                        error = %e,
                        "Transient error - will retry"
                    );
                    Err(result)
                }
                Err(_) => Ok(result),
            }
        })
        .await
        .unwrap_or_else(|e| e)
    }

    async fn execute_once(&self, probe: &StatusProbe) -> ReconResult<Value> {
        let mut request = match probe.method {
            ProbeMethod::Get => self.client.get(&probe.url),
            ProbeMethod::Post => self.client.post(&probe.url),
        };
        for (name, value) in &probe.headers {
            request = request.header(*name, value);
        }
        if let Some(body) = &probe.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            ReconError::ProviderUnavailable(format!("{} request failed: {}", probe.name, e))
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ReconError::ProviderUnavailable(format!(
                "{} returned HTTP {}",
                probe.name, status
            )));
        }
        if !status.is_success() {
            return Err(ReconError::MalformedPayload(format!(
                "{} returned HTTP {}",
                probe.name, status
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            ReconError::MalformedPayload(format!("{} returned non-JSON body: {}", probe.name, e))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]  // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;
    use serde_json::json;

    fn get_probe(url: String) -> StatusProbe {
        StatusProbe {
            name: "test_probe",
            method: ProbeMethod::Get,
            url,
            headers: vec![("access_token", "key_123".to_string())],
            body: None,
        }
    }

    #[tokio::test]
    async fn test_execute_parses_json_and_sends_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/payments/pay_1")
            .match_header("access_token", "key_123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "RECEIVED"}"#)
            .create_async()
            .await;

        let client = GatewayHttpClient::new();
        let body = client
            .execute(&get_probe(format!("{}/payments/pay_1", server.url())))
            .await
            .unwrap();

        assert_eq!(body["status"], "RECEIVED");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_probe_sends_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/consult")
            .match_body(mockito::Matcher::Json(json!({"idTransaction": "abc"})))
            .with_status(200)
            .with_body(r#"{"statusTransaction": "PAID_OUT"}"#)
            .create_async()
            .await;

        let probe = StatusProbe {
            name: "consult",
            method: ProbeMethod::Post,
            url: format!("{}/consult", server.url()),
            headers: vec![],
            body: Some(json!({"idTransaction": "abc"})),
        };
        let body = GatewayHttpClient::new().execute(&probe).await.unwrap();

        assert_eq!(body["statusTransaction"], "PAID_OUT");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/payments/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let result = GatewayHttpClient::new()
            .execute(&get_probe(format!("{}/payments/missing", server.url())))
            .await;

        assert!(matches!(result, Err(ReconError::MalformedPayload(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/payments/flaky")
            .with_status(503)
            .expect_at_least(2)
            .create_async()
            .await;

        let result = GatewayHttpClient::new()
            .execute(&get_probe(format!("{}/payments/flaky", server.url())))
            .await;

        assert!(matches!(result, Err(ReconError::ProviderUnavailable(_))));
        failing.assert_async().await;
    }
}
