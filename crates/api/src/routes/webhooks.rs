//! Inbound gateway webhook handlers
//!
//! Each provider pushes its own JSON shape. Handlers only extract the
//! external reference and the raw status token; verification, normalization
//! and idempotency all happen in the reconciliation engine. Replayed
//! deliveries get a 200 like first deliveries so the gateway stops retrying.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use sinalpay_shared::Provider;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Acknowledgement body returned for every processed delivery
#[derive(Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
    pub status: String,
}

fn ack(status: impl std::fmt::Display) -> Json<WebhookAck> {
    Json(WebhookAck {
        success: true,
        message: "processed".to_string(),
        status: status.to_string(),
    })
}

/// Walk candidate paths in order and return the first non-empty string
fn first_string<'a>(body: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths.iter().find_map(|path| {
        let mut node = body;
        for segment in *path {
            node = node.get(segment)?;
        }
        node.as_str().filter(|s| !s.is_empty())
    })
}

/// Asaas pushes charge events (`PAYMENT_*`) and transfer events
/// (`TRANSFER_*`) to the same configured endpoint. Charges reconcile the
/// payment row; transfers reconcile the matching withdrawal request.
pub async fn asaas(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<WebhookAck>> {
    let event = body.get("event").and_then(Value::as_str).unwrap_or_default();

    if event.starts_with("TRANSFER_") {
        let transfer_id = first_string(&body, &[&["transfer", "id"]]).ok_or_else(|| {
            ApiError::BadRequest("transfer id missing from payload".to_string())
        })?;
        // The transfer object carries a status field; older event shapes
        // only encode it in the event name itself
        let token = first_string(&body, &[&["transfer", "status"]])
            .map(str::to_string)
            .unwrap_or_else(|| event.trim_start_matches("TRANSFER_").to_string());

        let outcome = state
            .payments
            .withdrawals()
            .reconcile(Provider::Asaas, transfer_id, &token, &body)
            .await?;
        return Ok(ack(outcome.final_status()));
    }

    let external_id = first_string(
        &body,
        &[&["payment", "externalReference"], &["payment", "id"]],
    )
    .ok_or_else(|| ApiError::BadRequest("payment reference missing from payload".to_string()))?;
    let token = first_string(&body, &[&["payment", "status"]]).unwrap_or(event);

    let outcome = state
        .payments
        .engine()
        .reconcile(Provider::Asaas, external_id, token, &body)
        .await?;
    Ok(ack(outcome.final_state()))
}

/// AbacatePay wraps the billing object in `data`; some deliveries carry the
/// fields at the top level
pub async fn abacatepay(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<WebhookAck>> {
    let external_id = first_string(
        &body,
        &[
            &["data", "billing", "id"],
            &["data", "id"],
            &["billing", "id"],
            &["id"],
        ],
    )
    .ok_or_else(|| ApiError::BadRequest("billing id missing from payload".to_string()))?;
    let token = first_string(
        &body,
        &[
            &["data", "billing", "status"],
            &["data", "status"],
            &["status"],
            &["event"],
        ],
    )
    .ok_or_else(|| ApiError::BadRequest("status missing from payload".to_string()))?;

    let outcome = state
        .payments
        .engine()
        .reconcile(Provider::Abacatepay, external_id, token, &body)
        .await?;
    Ok(ack(outcome.final_state()))
}

/// SuitPay charge notifications: flat body with `requestNumber` (our
/// reference), `idTransaction`, `statusTransaction` and the `hash` the
/// engine verifies before touching anything
pub async fn suitpay(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<WebhookAck>> {
    let external_id = first_string(&body, &[&["requestNumber"], &["idTransaction"]])
        .ok_or_else(|| ApiError::BadRequest("requestNumber missing from payload".to_string()))?;
    let token = first_string(&body, &[&["statusTransaction"]]).ok_or_else(|| {
        ApiError::BadRequest("statusTransaction missing from payload".to_string())
    })?;

    let outcome = state
        .payments
        .engine()
        .reconcile(Provider::Suitpay, external_id, token, &body)
        .await?;
    Ok(ack(outcome.final_state()))
}

/// SuitPay payout notifications share the charge shape and hash scheme but
/// settle withdrawal requests instead of payments
pub async fn suitpay_payouts(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<WebhookAck>> {
    let transfer_id = first_string(&body, &[&["idTransaction"], &["requestNumber"]])
        .ok_or_else(|| ApiError::BadRequest("idTransaction missing from payload".to_string()))?;
    let token = first_string(&body, &[&["statusTransaction"]]).ok_or_else(|| {
        ApiError::BadRequest("statusTransaction missing from payload".to_string())
    })?;

    let outcome = state
        .payments
        .withdrawals()
        .reconcile(Provider::Suitpay, transfer_id, token, &body)
        .await?;
    Ok(ack(outcome.final_status()))
}

/// SecretPay delivers either a flat body or a `data`/`transaction` envelope
pub async fn secretpay(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<WebhookAck>> {
    let external_id = first_string(
        &body,
        &[
            &["reference"],
            &["external_reference"],
            &["data", "reference"],
            &["id"],
            &["data", "id"],
            &["transaction", "id"],
        ],
    )
    .ok_or_else(|| ApiError::BadRequest("transaction reference missing from payload".to_string()))?;
    let token = first_string(
        &body,
        &[&["status"], &["data", "status"], &["transaction", "status"]],
    )
    .ok_or_else(|| ApiError::BadRequest("status missing from payload".to_string()))?;

    let outcome = state
        .payments
        .engine()
        .reconcile(Provider::Secretpay, external_id, token, &body)
        .await?;
    Ok(ack(outcome.final_state()))
}

/// Faturefy (PayLatam) delivers a flat body or a `data` envelope
pub async fn faturefy(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<WebhookAck>> {
    let external_id = first_string(
        &body,
        &[
            &["reference"],
            &["external_reference"],
            &["data", "reference"],
            &["id"],
            &["data", "id"],
        ],
    )
    .ok_or_else(|| ApiError::BadRequest("transaction reference missing from payload".to_string()))?;
    let token = first_string(&body, &[&["status"], &["data", "status"]])
        .ok_or_else(|| ApiError::BadRequest("status missing from payload".to_string()))?;

    let outcome = state
        .payments
        .engine()
        .reconcile(Provider::Faturefy, external_id, token, &body)
        .await?;
    Ok(ack(outcome.final_state()))
}
