//! Gateway event audit log
//!
//! Append-only record of every webhook and poll result we processed, kept to
//! answer "what did the gateway actually send us?" after the fact. Writing an
//! event must never fail the reconciliation that produced it, so the logger
//! swallows insert errors and only warns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use sinalpay_shared::Provider;

use crate::error::ReconResult;

/// Which money flow the event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Inbound charge (user paying us)
    Payment,
    /// Outbound transfer (us paying a user)
    Transfer,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Payment => write!(f, "payment"),
            EventKind::Transfer => write!(f, "transfer"),
        }
    }
}

/// How the reconciliation of this delivery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOutcome {
    MarkedPaid,
    MarkedFailed,
    StillPending,
    AlreadyTerminal,
    AuthRejected,
    NotFound,
    Malformed,
    Completed,
    Rejected,
}

impl std::fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventOutcome::MarkedPaid => "marked_paid",
            EventOutcome::MarkedFailed => "marked_failed",
            EventOutcome::StillPending => "still_pending",
            EventOutcome::AlreadyTerminal => "already_terminal",
            EventOutcome::AuthRejected => "auth_rejected",
            EventOutcome::NotFound => "not_found",
            EventOutcome::Malformed => "malformed",
            EventOutcome::Completed => "completed",
            EventOutcome::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// Builder for gateway events
pub struct GatewayEventBuilder {
    provider: Provider,
    kind: EventKind,
    outcome: EventOutcome,
    external_ref: Option<String>,
    status_token: Option<String>,
    normalized_status: Option<String>,
    payload: Option<Value>,
}

impl GatewayEventBuilder {
    pub fn new(provider: Provider, kind: EventKind, outcome: EventOutcome) -> Self {
        Self {
            provider,
            kind,
            outcome,
            external_ref: None,
            status_token: None,
            normalized_status: None,
            payload: None,
        }
    }

    /// Set the identifier the gateway used for this delivery
    pub fn external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Set the raw status token as the gateway sent it
    pub fn status_token(mut self, token: impl Into<String>) -> Self {
        self.status_token = Some(token.into());
        self
    }

    /// Set the status the token normalized to
    pub fn normalized(mut self, status: impl Into<String>) -> Self {
        self.normalized_status = Some(status.into());
        self
    }

    /// Attach the delivery body
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Service for recording and pruning gateway events
#[derive(Clone)]
pub struct GatewayEventLogger {
    pool: PgPool,
}

impl GatewayEventLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an event, swallowing failures.
    pub async fn record(&self, builder: GatewayEventBuilder) {
        if let Err(e) = self.insert(builder).await {
            tracing::warn!("Failed to record gateway event: {}", e);
        }
    }

    async fn insert(&self, builder: GatewayEventBuilder) -> ReconResult<Uuid> {
        let event_id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO gateway_events (
                provider,
                external_ref,
                kind,
                status_token,
                normalized_status,
                outcome,
                payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(builder.provider)
        .bind(&builder.external_ref)
        .bind(builder.kind.to_string())
        .bind(&builder.status_token)
        .bind(&builder.normalized_status)
        .bind(builder.outcome.to_string())
        .bind(&builder.payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(event_id.0)
    }

    /// Drop events past the retention window. Returns how many went.
    pub async fn delete_older_than(&self, days: i32) -> ReconResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM gateway_events
            WHERE created_at < NOW() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
