//! Reconciliation engine
//!
//! Drives a gateway status report for a payment through lookup, verification,
//! normalization and the pending -> terminal transition. Deliveries are
//! at-least-once and unordered, so every path here has to be safe to replay:
//! the terminal short-circuit plus the compare-and-set on `state = 'pending'`
//! are the whole idempotency story, there is no dedup table.

use std::sync::Arc;

use serde_json::Value;
use sqlx::PgPool;

use sinalpay_shared::{Provider, Transaction, TransactionState};

use crate::error::{ReconError, ReconResult};
use crate::events::{EventKind, EventOutcome, GatewayEventBuilder, GatewayEventLogger};
use crate::gateway::GatewayRegistry;
use crate::plans::{self, GrantOutcome};
use crate::transactions::TransactionStore;

/// How one status report landed against the stored transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Row was already terminal; payload recorded, nothing else changed
    AlreadyTerminal(TransactionState),
    /// Report normalized to pending; payload recorded, state untouched
    StillPending,
    /// Row transitioned pending -> failed
    MarkedFailed,
    /// Row transitioned pending -> paid and the plan fan-out ran
    MarkedPaid(GrantOutcome),
}

impl ReconcileOutcome {
    /// The transaction state after this outcome.
    pub fn final_state(&self) -> TransactionState {
        match self {
            ReconcileOutcome::AlreadyTerminal(state) => *state,
            ReconcileOutcome::StillPending => TransactionState::Pending,
            ReconcileOutcome::MarkedFailed => TransactionState::Failed,
            ReconcileOutcome::MarkedPaid(_) => TransactionState::Paid,
        }
    }

    fn event_outcome(&self) -> EventOutcome {
        match self {
            ReconcileOutcome::AlreadyTerminal(_) => EventOutcome::AlreadyTerminal,
            ReconcileOutcome::StillPending => EventOutcome::StillPending,
            ReconcileOutcome::MarkedFailed => EventOutcome::MarkedFailed,
            ReconcileOutcome::MarkedPaid(_) => EventOutcome::MarkedPaid,
        }
    }
}

pub struct ReconciliationEngine {
    pool: PgPool,
    store: TransactionStore,
    registry: Arc<GatewayRegistry>,
    events: GatewayEventLogger,
}

impl ReconciliationEngine {
    pub fn new(pool: PgPool, registry: Arc<GatewayRegistry>) -> Self {
        Self {
            store: TransactionStore::new(pool.clone()),
            events: GatewayEventLogger::new(pool.clone()),
            pool,
            registry,
        }
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    /// Reconcile a webhook delivery: look the transaction up, verify the
    /// payload, then apply the reported status.
    ///
    /// Verification runs before any mutation. A payload that fails it leaves
    /// no trace on the transaction row and must never be retried by the
    /// caller.
    pub async fn reconcile(
        &self,
        provider: Provider,
        external_id: &str,
        status_token: &str,
        raw_payload: &Value,
    ) -> ReconResult<ReconcileOutcome> {
        let Some(tx) = self.store.find(provider, external_id).await? else {
            self.events
                .record(
                    GatewayEventBuilder::new(provider, EventKind::Payment, EventOutcome::NotFound)
                        .external_ref(external_id)
                        .status_token(status_token)
                        .payload(raw_payload.clone()),
                )
                .await;
            return Err(ReconError::TransactionNotFound(external_id.to_string()));
        };

        let gateway = self.registry.get(provider);
        if !gateway.verify(raw_payload) {
            tracing::warn!(
                provider = %provider,
                external_id = %external_id,
                "Webhook failed verification"
            );
            self.events
                .record(
                    GatewayEventBuilder::new(
                        provider,
                        EventKind::Payment,
                        EventOutcome::AuthRejected,
                    )
                    .external_ref(external_id)
                    .status_token(status_token)
                    .payload(raw_payload.clone()),
                )
                .await;
            return Err(ReconError::AuthenticationFailed(format!(
                "webhook verification failed for {}",
                provider
            )));
        }

        self.apply_status(&tx, status_token, raw_payload).await
    }

    /// Apply an already-trusted status report to a known transaction.
    ///
    /// This is the poll-recovery entry point: polling talks to the gateway
    /// API directly, so there is no webhook signature to check.
    pub async fn apply_status(
        &self,
        tx: &Transaction,
        status_token: &str,
        raw_payload: &Value,
    ) -> ReconResult<ReconcileOutcome> {
        let gateway = self.registry.get(tx.provider);
        let normalized = gateway.normalize_status(status_token);

        let outcome = if tx.state.is_terminal() {
            self.store.record_payload(tx.id, raw_payload).await?;
            ReconcileOutcome::AlreadyTerminal(tx.state)
        } else {
            match normalized {
                TransactionState::Pending => {
                    self.store.record_payload(tx.id, raw_payload).await?;
                    ReconcileOutcome::StillPending
                }
                TransactionState::Failed => {
                    if self.store.mark_failed(tx.id, raw_payload).await? {
                        ReconcileOutcome::MarkedFailed
                    } else {
                        // Lost the race to a concurrent terminal transition
                        let current = self.store.current_state(tx.id).await?;
                        self.store.record_payload(tx.id, raw_payload).await?;
                        ReconcileOutcome::AlreadyTerminal(current)
                    }
                }
                TransactionState::Paid => self.mark_paid(tx, raw_payload).await?,
            }
        };

        tracing::info!(
            transaction_id = %tx.id,
            provider = %tx.provider,
            status_token = %status_token,
            normalized = %normalized,
            final_state = %outcome.final_state(),
            "Reconciled payment status"
        );
        self.events
            .record(
                GatewayEventBuilder::new(tx.provider, EventKind::Payment, outcome.event_outcome())
                    .external_ref(&tx.external_id)
                    .status_token(status_token)
                    .normalized(normalized.to_string())
                    .payload(raw_payload.clone()),
            )
            .await;

        Ok(outcome)
    }

    /// Transition pending -> paid and run the plan fan-out, atomically.
    ///
    /// The compare-and-set and the grant/promotion writes share one database
    /// transaction so a crash can never leave a paid row without its plan
    /// side effects. The advisory lock serializes fan-outs per user.
    async fn mark_paid(
        &self,
        tx: &Transaction,
        raw_payload: &Value,
    ) -> ReconResult<ReconcileOutcome> {
        let mut db = self.pool.begin().await?;

        plans::lock_user(&mut db, tx.user_id).await?;

        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET state = 'paid', paid_at = NOW(), raw_provider_payload = $2, updated_at = NOW()
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(tx.id)
        .bind(raw_payload)
        .execute(&mut *db)
        .await?;

        if updated.rows_affected() == 1 {
            let grant = plans::activate_purchase(&mut db, tx.user_id, &tx.plan_name).await?;
            db.commit().await?;

            tracing::info!(
                transaction_id = %tx.id,
                user_id = %tx.user_id,
                plan = %tx.plan_name,
                plan_promoted = grant.plan_promoted,
                grant_created = grant.grant_created,
                active_grants = grant.active_grants,
                "Payment confirmed"
            );
            Ok(ReconcileOutcome::MarkedPaid(grant))
        } else {
            db.rollback().await?;

            let current = self.store.current_state(tx.id).await?;
            self.store.record_payload(tx.id, raw_payload).await?;
            Ok(ReconcileOutcome::AlreadyTerminal(current))
        }
    }
}
