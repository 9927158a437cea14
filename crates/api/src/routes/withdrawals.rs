//! Withdrawal request creation

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use sinalpay_shared::{PixKeyType, WithdrawalRequest};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    #[serde(alias = "user_id")]
    pub user_id: Uuid,
    pub amount: Decimal,
    #[serde(alias = "pix_key")]
    pub pix_key: String,
    #[serde(alias = "pix_key_type")]
    pub pix_key_type: String,
}

/// Create a withdrawal request. The amount leaves the balance here, not at
/// gateway settlement, so two concurrent requests cannot spend it twice.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateWithdrawalRequest>,
) -> ApiResult<(StatusCode, Json<WithdrawalRequest>)> {
    // FromStr rather than serde so gateway spellings like "telefone" work
    let key_type: PixKeyType = req.pix_key_type.parse().map_err(|_| {
        ApiError::BadRequest(format!("unknown pix key type: {}", req.pix_key_type))
    })?;

    let withdrawal = state
        .payments
        .withdrawals()
        .create(req.user_id, req.amount, &req.pix_key, key_type)
        .await?;

    Ok((StatusCode::CREATED, Json(withdrawal)))
}
