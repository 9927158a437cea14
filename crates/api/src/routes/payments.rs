//! Client-facing payment status polling

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sinalpay_shared::{Provider, TransactionState};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Poll request body. Client builds in the wild send both casings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatusRequest {
    #[serde(alias = "payment_id")]
    pub payment_id: String,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatusResponse {
    pub success: bool,
    pub status: String,
    pub is_paid: bool,
}

/// Poll one payment's status, querying the gateway when the row is still
/// pending. Unknown ids with a `userId` fall back to a recent-pending scan.
pub async fn poll_status(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(req): Json<PollStatusRequest>,
) -> ApiResult<Json<PollStatusResponse>> {
    let provider: Provider = provider
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown provider: {}", provider)))?;

    let status = state
        .payments
        .poller()
        .poll_status(provider, &req.payment_id, req.user_id)
        .await?;

    Ok(Json(PollStatusResponse {
        success: true,
        status: status.to_string(),
        is_paid: status == TransactionState::Paid,
    }))
}
