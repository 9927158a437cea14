//! Scheduled reconciliation sweeps
//!
//! Gateways occasionally never deliver a webhook. The sweep picks up pending
//! transactions old enough to be suspicious and runs them through the same
//! status probes a client poll would use.

use sinalpay_payments::PaymentsService;
use tracing::{error, info};

/// Rows younger than this are skipped; the client poll usually settles them
const MIN_AGE_MINUTES: i32 = 15;
/// Rows older than this are skipped; PIX charges expire within a day
const MAX_AGE_HOURS: i32 = 24;
/// Upper bound per sweep so a backlog cannot monopolize the scheduler
const SWEEP_BATCH_SIZE: i64 = 50;

/// Retention window for the gateway event audit log
const EVENT_RETENTION_DAYS: i32 = 90;

/// Re-poll pending transactions that have gone quiet
pub async fn sweep_stale_pending(payments: &PaymentsService) {
    let stale = match payments
        .engine()
        .store()
        .stale_pending(MIN_AGE_MINUTES, MAX_AGE_HOURS, SWEEP_BATCH_SIZE)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "Failed to fetch stale pending transactions");
            return;
        }
    };

    if stale.is_empty() {
        return; // No work to do
    }

    info!(count = stale.len(), "Sweeping stale pending transactions");

    let mut settled = 0;
    for tx in &stale {
        match payments.poller().refresh(tx).await {
            Ok(state) if state.is_terminal() => {
                settled += 1;
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    transaction_id = %tx.id,
                    provider = %tx.provider,
                    error = %e,
                    "Sweep failed for transaction"
                );
            }
        }
    }

    info!(count = stale.len(), settled, "Sweep finished");
}

/// Delete gateway events past the retention window
pub async fn prune_gateway_events(payments: &PaymentsService) {
    match payments.events().delete_older_than(EVENT_RETENTION_DAYS).await {
        Ok(0) => {}
        Ok(deleted) => {
            info!(
                deleted,
                days = EVENT_RETENTION_DAYS,
                "Pruned old gateway events"
            );
        }
        Err(e) => {
            error!(error = %e, "Failed to prune gateway events");
        }
    }
}
