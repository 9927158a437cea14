//! Active status polling for transactions whose webhook never arrived
//!
//! Each gateway gets an ordered list of named probes because none of them
//! documents a single reliable status endpoint: some want our external id,
//! some want their own transaction id, some bury the answer in a list
//! response. The first probe that yields a recognizable status token wins and
//! its name is logged; if every probe fails the transaction simply keeps its
//! last persisted state.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use sinalpay_shared::{Provider, Transaction, TransactionState};

use crate::client::{GatewayHttpClient, ProbeMethod, StatusProbe};
use crate::config::GatewayConfig;
use crate::engine::ReconciliationEngine;
use crate::error::{ReconError, ReconResult};
use crate::transactions::TransactionStore;

/// How far back the recent-transaction fallback scan looks.
const RECOVERY_WINDOW_HOURS: i32 = 24;

fn bearer(key: &str) -> Vec<(&'static str, String)> {
    vec![("Authorization", format!("Bearer {}", key))]
}

/// Build the ordered probe list for one transaction.
fn build_probes(config: &GatewayConfig, tx: &Transaction) -> Vec<StatusProbe> {
    let creds = config.credentials(tx.provider);
    let base = creds.base_url.trim_end_matches('/');
    // Prefer the gateway's own id when we have it; webhooks and status
    // endpoints are more consistent about that one.
    let payment_id = tx
        .provider_transaction_id
        .as_deref()
        .unwrap_or(&tx.external_id);

    match tx.provider {
        Provider::Asaas => vec![
            StatusProbe {
                name: "asaas_payment_by_id",
                method: ProbeMethod::Get,
                url: format!("{}/payments/{}", base, payment_id),
                headers: vec![("access_token", creds.api_key.clone())],
                body: None,
            },
            StatusProbe {
                name: "asaas_payment_by_external_reference",
                method: ProbeMethod::Get,
                url: format!("{}/payments?externalReference={}", base, tx.external_id),
                headers: vec![("access_token", creds.api_key.clone())],
                body: None,
            },
        ],
        Provider::Abacatepay => vec![
            StatusProbe {
                name: "abacatepay_billing_get",
                method: ProbeMethod::Get,
                url: format!("{}/billing/get?id={}", base, payment_id),
                headers: bearer(&creds.api_key),
                body: None,
            },
            StatusProbe {
                name: "abacatepay_pix_qrcode_check",
                method: ProbeMethod::Get,
                url: format!("{}/pixQrCode/check?id={}", base, payment_id),
                headers: bearer(&creds.api_key),
                body: None,
            },
        ],
        Provider::Suitpay => {
            let headers = vec![
                ("ci", creds.api_key.clone()),
                ("cs", creds.api_secret.clone().unwrap_or_default()),
            ];
            let url = format!("{}/api/v1/gateway/consult-status-transaction", base);
            vec![
                StatusProbe {
                    name: "suitpay_by_transaction_id",
                    method: ProbeMethod::Post,
                    url: url.clone(),
                    headers: headers.clone(),
                    body: Some(json!({ "idTransaction": payment_id })),
                },
                StatusProbe {
                    name: "suitpay_by_request_number",
                    method: ProbeMethod::Post,
                    url,
                    headers,
                    body: Some(json!({ "requestNumber": tx.external_id })),
                },
            ]
        }
        Provider::Secretpay => vec![
            StatusProbe {
                name: "secretpay_transaction_by_id",
                method: ProbeMethod::Get,
                url: format!("{}/transactions/{}", base, payment_id),
                headers: bearer(&creds.api_key),
                body: None,
            },
            StatusProbe {
                name: "secretpay_pix_status_by_reference",
                method: ProbeMethod::Get,
                url: format!("{}/pix/status?reference={}", base, tx.external_id),
                headers: bearer(&creds.api_key),
                body: None,
            },
        ],
        Provider::Faturefy => vec![
            StatusProbe {
                name: "faturefy_transaction_by_id",
                method: ProbeMethod::Get,
                url: format!("{}/transactions/{}", base, payment_id),
                headers: bearer(&creds.api_key),
                body: None,
            },
            StatusProbe {
                name: "faturefy_transactions_by_reference",
                method: ProbeMethod::Get,
                url: format!("{}/transactions?reference={}", base, tx.external_id),
                headers: bearer(&creds.api_key),
                body: None,
            },
        ],
    }
}

fn lookup<'a>(body: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = body;
    for segment in path {
        current = match segment.parse::<usize>() {
            Ok(idx) => current.get(idx)?,
            Err(_) => current.get(segment)?,
        };
    }
    Some(current)
}

/// Pull the raw status token out of a probe response, if the shape is one we
/// recognize for that gateway.
fn extract_status_token(provider: Provider, body: &Value) -> Option<String> {
    let paths: &[&[&str]] = match provider {
        Provider::Asaas => &[&["status"], &["data", "0", "status"]],
        Provider::Abacatepay => &[&["data", "status"], &["status"], &["billing", "status"]],
        Provider::Suitpay => &[&["statusTransaction"], &["response", "statusTransaction"]],
        Provider::Secretpay => &[&["status"], &["data", "status"], &["transaction", "status"]],
        Provider::Faturefy => &[&["status"], &["data", "status"], &["data", "0", "status"]],
    };

    paths
        .iter()
        .find_map(|path| lookup(body, path).and_then(Value::as_str))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub struct PollService {
    engine: Arc<ReconciliationEngine>,
    store: TransactionStore,
    config: GatewayConfig,
    client: GatewayHttpClient,
}

impl PollService {
    pub fn new(engine: Arc<ReconciliationEngine>, config: GatewayConfig) -> Self {
        Self {
            store: engine.store().clone(),
            engine,
            config,
            client: GatewayHttpClient::new(),
        }
    }

    /// Resolve the current state of a payment on behalf of a client that
    /// never saw it confirm.
    ///
    /// Terminal rows are answered straight from the database. Pending rows
    /// get actively polled. An unknown id falls back to scanning the user's
    /// recent pending transactions when a user id was supplied.
    pub async fn poll_status(
        &self,
        provider: Provider,
        external_id: &str,
        user_id: Option<Uuid>,
    ) -> ReconResult<TransactionState> {
        match self.store.find(provider, external_id).await? {
            Some(tx) => {
                if tx.state.is_terminal() {
                    return Ok(tx.state);
                }
                self.refresh(&tx).await
            }
            None => match user_id {
                Some(user_id) => self.recover_from_recent(user_id, provider, external_id).await,
                None => Err(ReconError::TransactionNotFound(external_id.to_string())),
            },
        }
    }

    /// Poll the gateway for one pending transaction and apply whatever it
    /// reports. All probes failing is not an error: the caller gets the last
    /// persisted state back.
    pub async fn refresh(&self, tx: &Transaction) -> ReconResult<TransactionState> {
        let probes = build_probes(&self.config, tx);

        for probe in &probes {
            let body = match self.client.execute(probe).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(
                        probe = probe.name,
                        transaction_id = %tx.id,
                        error = %e,
                        "Status probe failed"
                    );
                    continue;
                }
            };

            match extract_status_token(tx.provider, &body) {
                Some(token) => {
                    tracing::info!(
                        probe = probe.name,
                        transaction_id = %tx.id,
                        provider = %tx.provider,
                        status_token = %token,
                        "Status probe succeeded"
                    );
                    let outcome = self.engine.apply_status(tx, &token, &body).await?;
                    return Ok(outcome.final_state());
                }
                None => {
                    tracing::debug!(
                        probe = probe.name,
                        transaction_id = %tx.id,
                        "Status probe returned no recognizable status"
                    );
                }
            }
        }

        tracing::warn!(
            transaction_id = %tx.id,
            provider = %tx.provider,
            "All status probes failed, keeping last known state"
        );
        Ok(tx.state)
    }

    async fn recover_from_recent(
        &self,
        user_id: Uuid,
        provider: Provider,
        external_id: &str,
    ) -> ReconResult<TransactionState> {
        let pending = self
            .store
            .recent_pending_for_user(user_id, provider, RECOVERY_WINDOW_HOURS)
            .await?;

        if pending.is_empty() {
            return Err(ReconError::TransactionNotFound(external_id.to_string()));
        }

        tracing::info!(
            user_id = %user_id,
            provider = %provider,
            pending = pending.len(),
            "Unknown payment id, scanning recent pending transactions"
        );

        // Reconcile every candidate but answer for the newest one, which is
        // almost always the payment the client is waiting on.
        let mut newest = None;
        for tx in &pending {
            let state = self.refresh(tx).await?;
            newest.get_or_insert(state);
        }

        newest.ok_or_else(|| ReconError::TransactionNotFound(external_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    use crate::config::ProviderCredentials;

    fn creds(base_url: &str, key: &str) -> ProviderCredentials {
        ProviderCredentials {
            base_url: base_url.to_string(),
            api_key: key.to_string(),
            api_secret: None,
            webhook_secret: None,
        }
    }

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            asaas: creds("https://api.asaas.com/v3", "asaas_key"),
            abacatepay: creds("https://api.abacatepay.com/v1", "abacate_key"),
            suitpay: ProviderCredentials {
                base_url: "https://ws.suitpay.app".to_string(),
                api_key: "client_id".to_string(),
                api_secret: Some("client_secret".to_string()),
                webhook_secret: Some("hook_secret".to_string()),
            },
            secretpay: creds("https://api.secretpay.com.br/v1", "secret_key"),
            faturefy: creds("https://api.faturefy.com.br/v1", "faturefy_key"),
        }
    }

    fn pending_tx(provider: Provider, provider_transaction_id: Option<&str>) -> Transaction {
        let now = OffsetDateTime::now_utc();
        Transaction {
            id: Uuid::new_v4(),
            external_id: "p_1".to_string(),
            provider_transaction_id: provider_transaction_id.map(str::to_string),
            user_id: Uuid::new_v4(),
            plan_name: "master".to_string(),
            amount: Decimal::new(9700, 2),
            provider,
            state: TransactionState::Pending,
            raw_provider_payload: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_asaas_probes_prefer_gateway_id() {
        let probes = build_probes(&test_config(), &pending_tx(Provider::Asaas, Some("pay_9")));

        assert_eq!(probes.len(), 2);
        assert_eq!(probes[0].name, "asaas_payment_by_id");
        assert!(probes[0].url.ends_with("/payments/pay_9"));
        assert_eq!(probes[0].headers[0], ("access_token", "asaas_key".to_string()));
        assert_eq!(probes[1].name, "asaas_payment_by_external_reference");
        assert!(probes[1].url.contains("externalReference=p_1"));
    }

    #[test]
    fn test_asaas_probes_fall_back_to_external_id() {
        let probes = build_probes(&test_config(), &pending_tx(Provider::Asaas, None));
        assert!(probes[0].url.ends_with("/payments/p_1"));
    }

    #[test]
    fn test_suitpay_probes_use_post_with_credential_headers() {
        let probes = build_probes(&test_config(), &pending_tx(Provider::Suitpay, Some("tx_7")));

        assert_eq!(probes[0].method, ProbeMethod::Post);
        assert!(probes[0]
            .url
            .ends_with("/api/v1/gateway/consult-status-transaction"));
        assert!(probes[0].headers.contains(&("ci", "client_id".to_string())));
        assert!(probes[0].headers.contains(&("cs", "client_secret".to_string())));
        assert_eq!(probes[0].body, Some(json!({"idTransaction": "tx_7"})));
        assert_eq!(probes[1].body, Some(json!({"requestNumber": "p_1"})));
    }

    #[test]
    fn test_extract_asaas_status_from_list_response() {
        let body = json!({"data": [{"id": "pay_9", "status": "RECEIVED"}]});
        assert_eq!(
            extract_status_token(Provider::Asaas, &body),
            Some("RECEIVED".to_string())
        );
    }

    #[test]
    fn test_extract_prefers_nested_data_for_abacatepay() {
        let body = json!({"data": {"status": "PAID"}, "status": "ok"});
        assert_eq!(
            extract_status_token(Provider::Abacatepay, &body),
            Some("PAID".to_string())
        );
    }

    #[test]
    fn test_extract_suitpay_status_transaction() {
        let body = json!({"statusTransaction": "PAID_OUT"});
        assert_eq!(
            extract_status_token(Provider::Suitpay, &body),
            Some("PAID_OUT".to_string())
        );
    }

    #[test]
    fn test_extract_rejects_unrecognizable_shapes() {
        assert_eq!(extract_status_token(Provider::Asaas, &json!({})), None);
        assert_eq!(
            extract_status_token(Provider::Asaas, &json!({"status": 42})),
            None
        );
        assert_eq!(
            extract_status_token(Provider::Asaas, &json!({"status": ""})),
            None
        );
        assert_eq!(
            extract_status_token(Provider::Suitpay, &json!({"status": "PAID"})),
            None
        );
    }
}
