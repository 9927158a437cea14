//! Withdrawal requests and transfer reconciliation
//!
//! The balance debit happens when the request is created, inside the same
//! transaction as the insert, guarded by `available_balance >= amount`. From
//! then on the money is spoken for: a completed transfer just flips status,
//! and a rejected one refunds exactly once through the same compare-and-set
//! discipline payments use.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use sinalpay_shared::{PixKeyType, Provider, WithdrawalRequest, WithdrawalStatus};

use crate::error::{ReconError, ReconResult};
use crate::events::{EventKind, EventOutcome, GatewayEventBuilder, GatewayEventLogger};
use crate::gateway::GatewayRegistry;

/// Map a gateway's transfer status token onto our withdrawal lifecycle.
///
/// Only Asaas and SuitPay actually push transfer webhooks; tokens from any
/// other gateway, and anything unrecognized, leave the withdrawal in flight.
pub fn normalize_transfer_status(provider: Provider, token: &str) -> WithdrawalStatus {
    match provider {
        Provider::Asaas => match token.to_uppercase().as_str() {
            "DONE" => WithdrawalStatus::Completed,
            "FAILED" | "CANCELLED" | "CANCELED" => WithdrawalStatus::Rejected,
            // PENDING, BANK_PROCESSING and anything unrecognized
            _ => WithdrawalStatus::Processing,
        },
        Provider::Suitpay => match token.to_uppercase().as_str() {
            "PAID_OUT" | "PAYED_OUT" => WithdrawalStatus::Completed,
            "CANCELED" | "CANCELLED" | "UNDONE" | "CHARGEBACK" | "ERROR" => {
                WithdrawalStatus::Rejected
            }
            _ => WithdrawalStatus::Processing,
        },
        _ => WithdrawalStatus::Processing,
    }
}

/// How a transfer status report landed against the stored withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalOutcome {
    /// Row was already terminal; payload recorded, nothing else changed
    AlreadyTerminal(WithdrawalStatus),
    /// Report left the withdrawal in flight
    StillProcessing,
    /// Transfer settled, processed_at stamped
    Completed,
    /// Transfer failed and the amount went back to the balance
    Rejected { refunded: Decimal },
}

impl WithdrawalOutcome {
    pub fn final_status(&self) -> WithdrawalStatus {
        match self {
            WithdrawalOutcome::AlreadyTerminal(status) => *status,
            WithdrawalOutcome::StillProcessing => WithdrawalStatus::Processing,
            WithdrawalOutcome::Completed => WithdrawalStatus::Completed,
            WithdrawalOutcome::Rejected { .. } => WithdrawalStatus::Rejected,
        }
    }

    fn event_outcome(&self) -> EventOutcome {
        match self {
            WithdrawalOutcome::AlreadyTerminal(_) => EventOutcome::AlreadyTerminal,
            WithdrawalOutcome::StillProcessing => EventOutcome::StillPending,
            WithdrawalOutcome::Completed => EventOutcome::Completed,
            WithdrawalOutcome::Rejected { .. } => EventOutcome::Rejected,
        }
    }
}

pub struct WithdrawalService {
    pool: PgPool,
    registry: Arc<GatewayRegistry>,
    events: GatewayEventLogger,
}

impl WithdrawalService {
    pub fn new(pool: PgPool, registry: Arc<GatewayRegistry>) -> Self {
        Self {
            events: GatewayEventLogger::new(pool.clone()),
            pool,
            registry,
        }
    }

    /// Create a withdrawal request, debiting the balance up front.
    ///
    /// Debit and insert share one transaction; if the balance does not cover
    /// the amount nothing is written.
    pub async fn create(
        &self,
        user_id: Uuid,
        amount: Decimal,
        pix_key: &str,
        pix_key_type: PixKeyType,
    ) -> ReconResult<WithdrawalRequest> {
        if amount <= Decimal::ZERO {
            return Err(ReconError::InvalidAmount(format!(
                "withdrawal amount must be positive, got {}",
                amount
            )));
        }

        let mut db = self.pool.begin().await?;

        let debited = sqlx::query(
            r#"
            UPDATE profiles
            SET available_balance = available_balance - $2, updated_at = NOW()
            WHERE user_id = $1 AND available_balance >= $2
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *db)
        .await?;

        if debited.rows_affected() == 0 {
            db.rollback().await?;

            let available: Option<Decimal> =
                sqlx::query_scalar(r#"SELECT available_balance FROM profiles WHERE user_id = $1"#)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(ReconError::InsufficientBalance {
                available: available.unwrap_or(Decimal::ZERO),
                requested: amount,
            });
        }

        let request = sqlx::query_as::<_, WithdrawalRequest>(
            r#"
            INSERT INTO withdrawal_requests (user_id, amount, pix_key, pix_key_type, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, user_id, amount, pix_key, pix_key_type, status, provider,
                      provider_transfer_id, transfer_data, processed_at, admin_notes,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(pix_key)
        .bind(pix_key_type.to_string())
        .fetch_one(&mut *db)
        .await?;

        db.commit().await?;

        tracing::info!(
            withdrawal_id = %request.id,
            user_id = %user_id,
            amount = %amount,
            "Created withdrawal request"
        );
        Ok(request)
    }

    /// Reconcile a transfer status report from a gateway.
    pub async fn reconcile(
        &self,
        provider: Provider,
        transfer_id: &str,
        status_token: &str,
        raw_payload: &Value,
    ) -> ReconResult<WithdrawalOutcome> {
        let Some(withdrawal) = self.find(provider, transfer_id).await? else {
            self.events
                .record(
                    GatewayEventBuilder::new(provider, EventKind::Transfer, EventOutcome::NotFound)
                        .external_ref(transfer_id)
                        .status_token(status_token)
                        .payload(raw_payload.clone()),
                )
                .await;
            return Err(ReconError::WithdrawalNotFound(transfer_id.to_string()));
        };

        if !self.registry.get(provider).verify(raw_payload) {
            tracing::warn!(
                provider = %provider,
                transfer_id = %transfer_id,
                "Transfer webhook failed verification"
            );
            self.events
                .record(
                    GatewayEventBuilder::new(
                        provider,
                        EventKind::Transfer,
                        EventOutcome::AuthRejected,
                    )
                    .external_ref(transfer_id)
                    .status_token(status_token)
                    .payload(raw_payload.clone()),
                )
                .await;
            return Err(ReconError::AuthenticationFailed(format!(
                "transfer webhook verification failed for {}",
                provider
            )));
        }

        let normalized = normalize_transfer_status(provider, status_token);

        let outcome = if withdrawal.status.is_terminal() {
            self.record_transfer_data(withdrawal.id, raw_payload).await?;
            WithdrawalOutcome::AlreadyTerminal(withdrawal.status)
        } else {
            match normalized {
                WithdrawalStatus::Completed => self.complete(&withdrawal, raw_payload).await?,
                WithdrawalStatus::Rejected => self.reject(&withdrawal, raw_payload).await?,
                _ => {
                    self.record_transfer_data(withdrawal.id, raw_payload).await?;
                    WithdrawalOutcome::StillProcessing
                }
            }
        };

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            provider = %provider,
            status_token = %status_token,
            final_status = %outcome.final_status(),
            "Reconciled transfer status"
        );
        self.events
            .record(
                GatewayEventBuilder::new(provider, EventKind::Transfer, outcome.event_outcome())
                    .external_ref(transfer_id)
                    .status_token(status_token)
                    .normalized(normalized.to_string())
                    .payload(raw_payload.clone()),
            )
            .await;

        Ok(outcome)
    }

    async fn find(
        &self,
        provider: Provider,
        transfer_id: &str,
    ) -> ReconResult<Option<WithdrawalRequest>> {
        let withdrawal = sqlx::query_as::<_, WithdrawalRequest>(
            r#"
            SELECT id, user_id, amount, pix_key, pix_key_type, status, provider,
                   provider_transfer_id, transfer_data, processed_at, admin_notes,
                   created_at, updated_at
            FROM withdrawal_requests
            WHERE provider = $1 AND provider_transfer_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(provider)
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(withdrawal)
    }

    async fn current_status(&self, id: Uuid) -> ReconResult<WithdrawalStatus> {
        let status: Option<WithdrawalStatus> =
            sqlx::query_scalar(r#"SELECT status FROM withdrawal_requests WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        status.ok_or_else(|| ReconError::WithdrawalNotFound(id.to_string()))
    }

    async fn record_transfer_data(&self, id: Uuid, payload: &Value) -> ReconResult<()> {
        sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET transfer_data = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete(
        &self,
        withdrawal: &WithdrawalRequest,
        raw_payload: &Value,
    ) -> ReconResult<WithdrawalOutcome> {
        let updated = sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = 'completed', processed_at = NOW(), transfer_data = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(withdrawal.id)
        .bind(raw_payload)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            Ok(WithdrawalOutcome::Completed)
        } else {
            let current = self.current_status(withdrawal.id).await?;
            self.record_transfer_data(withdrawal.id, raw_payload).await?;
            Ok(WithdrawalOutcome::AlreadyTerminal(current))
        }
    }

    /// Reject and refund in one transaction. The compare-and-set is what
    /// makes the refund exactly-once: only the delivery that wins the
    /// transition runs the balance credit.
    async fn reject(
        &self,
        withdrawal: &WithdrawalRequest,
        raw_payload: &Value,
    ) -> ReconResult<WithdrawalOutcome> {
        let mut db = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = 'rejected', transfer_data = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(withdrawal.id)
        .bind(raw_payload)
        .execute(&mut *db)
        .await?;

        if updated.rows_affected() == 1 {
            sqlx::query(
                r#"
                UPDATE profiles
                SET available_balance = available_balance + $2, updated_at = NOW()
                WHERE user_id = $1
                "#,
            )
            .bind(withdrawal.user_id)
            .bind(withdrawal.amount)
            .execute(&mut *db)
            .await?;

            db.commit().await?;

            tracing::info!(
                withdrawal_id = %withdrawal.id,
                user_id = %withdrawal.user_id,
                refunded = %withdrawal.amount,
                "Transfer rejected, balance refunded"
            );
            Ok(WithdrawalOutcome::Rejected {
                refunded: withdrawal.amount,
            })
        } else {
            db.rollback().await?;

            let current = self.current_status(withdrawal.id).await?;
            self.record_transfer_data(withdrawal.id, raw_payload).await?;
            Ok(WithdrawalOutcome::AlreadyTerminal(current))
        }
    }
}
