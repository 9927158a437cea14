//! Transaction lookups and single-row state transitions
//!
//! Terminal transitions are compare-and-set updates guarded by
//! `WHERE state = 'pending'`. Concurrent webhook deliveries race on that
//! predicate and exactly one wins; the loser observes zero rows affected
//! and falls back to reading the row it lost to.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use sinalpay_shared::{Provider, Transaction, TransactionState};

use crate::error::{ReconError, ReconResult};

#[derive(Clone)]
pub struct TransactionStore {
    pool: PgPool,
}

impl TransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a transaction by the identifier the gateway echoes back.
    ///
    /// Matches our own external_id first, then the gateway-assigned
    /// provider_transaction_id, since webhooks are inconsistent about
    /// which one they carry.
    pub async fn find(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> ReconResult<Option<Transaction>> {
        let tx = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_id, provider_transaction_id, user_id, plan_name,
                   amount, provider, state, raw_provider_payload, paid_at,
                   created_at, updated_at
            FROM transactions
            WHERE provider = $1
              AND (external_id = $2 OR provider_transaction_id = $2)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tx)
    }

    pub async fn get(&self, id: Uuid) -> ReconResult<Transaction> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_id, provider_transaction_id, user_id, plan_name,
                   amount, provider, state, raw_provider_payload, paid_at,
                   created_at, updated_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ReconError::TransactionNotFound(id.to_string()))
    }

    /// Pending transactions a user created for one gateway inside the
    /// recovery window. Used when a poll request cannot resolve an id.
    pub async fn recent_pending_for_user(
        &self,
        user_id: Uuid,
        provider: Provider,
        hours: i32,
    ) -> ReconResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_id, provider_transaction_id, user_id, plan_name,
                   amount, provider, state, raw_provider_payload, paid_at,
                   created_at, updated_at
            FROM transactions
            WHERE user_id = $1
              AND provider = $2
              AND state = 'pending'
              AND created_at > NOW() - make_interval(hours => $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(hours)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Pending transactions old enough that their webhook likely got lost,
    /// but young enough to still be worth chasing.
    pub async fn stale_pending(
        &self,
        min_age_minutes: i32,
        max_age_hours: i32,
        limit: i64,
    ) -> ReconResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, external_id, provider_transaction_id, user_id, plan_name,
                   amount, provider, state, raw_provider_payload, paid_at,
                   created_at, updated_at
            FROM transactions
            WHERE state = 'pending'
              AND created_at < NOW() - make_interval(mins => $1)
              AND created_at > NOW() - make_interval(hours => $2)
            ORDER BY created_at ASC
            LIMIT $3
            "#,
        )
        .bind(min_age_minutes)
        .bind(max_age_hours)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn current_state(&self, id: Uuid) -> ReconResult<TransactionState> {
        let state: Option<TransactionState> =
            sqlx::query_scalar(r#"SELECT state FROM transactions WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        state.ok_or_else(|| ReconError::TransactionNotFound(id.to_string()))
    }

    /// Attach the latest gateway payload to a row without touching its state.
    pub async fn record_payload(&self, id: Uuid, payload: &Value) -> ReconResult<()> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET raw_provider_payload = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Compare-and-set pending -> failed. Returns false when the row was
    /// no longer pending, in which case nothing was written.
    pub async fn mark_failed(&self, id: Uuid, payload: &Value) -> ReconResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET state = 'failed', raw_provider_payload = $2, updated_at = NOW()
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
