//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sinalpay_payments::ReconError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    // Webhook authenticity
    #[error("Webhook verification failed")]
    WebhookVerificationFailed,

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Resource already exists")]
    Conflict(String),

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
    #[error("Payment gateway unavailable")]
    GatewayUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Validation
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::InsufficientBalance(msg) => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_BALANCE", msg.clone())
            }

            // Webhook authenticity
            ApiError::WebhookVerificationFailed => (
                StatusCode::UNAUTHORIZED,
                "WEBHOOK_VERIFICATION_FAILED",
                self.to_string(),
            ),

            // Resources
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            // Internal
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database error".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
            ApiError::GatewayUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "GATEWAY_UNAVAILABLE",
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<ReconError> for ApiError {
    fn from(err: ReconError) -> Self {
        match err {
            ReconError::TransactionNotFound(id) => {
                ApiError::NotFound(format!("Transaction not found: {}", id))
            }
            ReconError::WithdrawalNotFound(id) => {
                ApiError::NotFound(format!("Withdrawal not found: {}", id))
            }
            ReconError::AuthenticationFailed(_) => ApiError::WebhookVerificationFailed,
            ReconError::MalformedPayload(msg) => ApiError::BadRequest(msg),
            ReconError::InvalidAmount(msg) => ApiError::BadRequest(msg),
            ReconError::InsufficientBalance {
                available,
                requested,
            } => ApiError::InsufficientBalance(format!(
                "available {}, requested {}",
                available, requested
            )),
            ReconError::ProviderUnavailable(msg) => {
                tracing::warn!("Gateway unavailable: {}", msg);
                ApiError::GatewayUnavailable
            }
            ReconError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                ApiError::Database(msg)
            }
            ReconError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                ApiError::Internal
            }
            ReconError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError::Internal
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    // PostgreSQL unique violation
                    if code == "23505" {
                        return ApiError::Conflict("Resource already exists".to_string());
                    }
                }
                ApiError::Database(db_err.to_string())
            }
            _ => ApiError::Database(err.to_string()),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recon_error_mapping() {
        let err: ApiError = ReconError::TransactionNotFound("abc123".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = ReconError::AuthenticationFailed("suitpay".to_string()).into();
        assert!(matches!(err, ApiError::WebhookVerificationFailed));

        let err: ApiError = ReconError::MalformedPayload("missing id".to_string()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = ReconError::ProviderUnavailable("timeout".to_string()).into();
        assert!(matches!(err, ApiError::GatewayUnavailable));
    }
}
