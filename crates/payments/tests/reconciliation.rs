//! Integration tests for payment and withdrawal reconciliation
//!
//! These tests exercise the full engine against a real Postgres database:
//! idempotent replays, the plan fan-out, the grant cap, refund-once
//! semantics and polling recovery with a mocked gateway API.
//!
//! ## Running Tests
//! ```bash
//! export DATABASE_URL="postgres://localhost/sinalpay_test"
//! cargo test -p sinalpay-payments --test reconciliation -- --ignored --test-threads=1
//! ```

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use sinalpay_payments::providers::suitpay_webhook_hash;
use sinalpay_payments::{
    GatewayConfig, PaymentsService, ProviderCredentials, ReconError, ReconcileOutcome,
    WithdrawalOutcome,
};
use sinalpay_shared::{PixKeyType, Provider};

const TEST_WEBHOOK_SECRET: &str = "test_hook_secret";

// ============================================================================
// Test Utilities
// ============================================================================

fn blank_credentials(base_url: &str) -> ProviderCredentials {
    ProviderCredentials {
        base_url: base_url.to_string(),
        api_key: "test_key".to_string(),
        api_secret: None,
        webhook_secret: None,
    }
}

fn test_gateway_config(asaas_base_url: &str) -> GatewayConfig {
    GatewayConfig {
        asaas: blank_credentials(asaas_base_url),
        abacatepay: blank_credentials("http://127.0.0.1:9"),
        suitpay: ProviderCredentials {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "test_client_id".to_string(),
            api_secret: Some("test_client_secret".to_string()),
            webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
        },
        secretpay: blank_credentials("http://127.0.0.1:9"),
        faturefy: blank_credentials("http://127.0.0.1:9"),
    }
}

/// Connect to the test database and build the service with gateway base URLs
/// pointed at an unroutable port so no test accidentally talks to a real API.
async fn setup() -> (PaymentsService, PgPool) {
    setup_with_asaas_url("http://127.0.0.1:9").await
}

async fn setup_with_asaas_url(asaas_base_url: &str) -> (PaymentsService, PgPool) {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sinalpay_shared::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let service = PaymentsService::new(test_gateway_config(asaas_base_url), pool.clone());
    (service, pool)
}

async fn create_profile(pool: &PgPool, plan: &str, balance: Decimal) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, plan, available_balance)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(plan)
    .bind(balance)
    .execute(pool)
    .await
    .expect("Failed to create test profile");

    user_id
}

async fn create_pending_transaction(
    pool: &PgPool,
    user_id: Uuid,
    provider: Provider,
    external_id: &str,
    provider_transaction_id: Option<&str>,
    plan_name: &str,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO transactions
            (id, external_id, provider_transaction_id, user_id, plan_name, amount, provider, state)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
        "#,
    )
    .bind(id)
    .bind(external_id)
    .bind(provider_transaction_id)
    .bind(user_id)
    .bind(plan_name)
    .bind(Decimal::new(9700, 2))
    .bind(provider)
    .execute(pool)
    .await
    .expect("Failed to create test transaction");

    id
}

async fn attach_transfer(pool: &PgPool, withdrawal_id: Uuid, provider: Provider, transfer_id: &str) {
    sqlx::query(
        r#"
        UPDATE withdrawal_requests
        SET provider = $2, provider_transfer_id = $3, status = 'processing', updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(withdrawal_id)
    .bind(provider)
    .bind(transfer_id)
    .execute(pool)
    .await
    .expect("Failed to attach transfer to withdrawal");
}

async fn backdate_transaction(pool: &PgPool, id: Uuid, age: &str) {
    sqlx::query(r#"UPDATE transactions SET created_at = NOW() - $2::interval WHERE id = $1"#)
        .bind(id)
        .bind(age)
        .execute(pool)
        .await
        .expect("Failed to backdate transaction");
}

async fn transaction_state(pool: &PgPool, id: Uuid) -> String {
    sqlx::query_scalar(r#"SELECT state FROM transactions WHERE id = $1"#)
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Failed to read transaction state")
}

async fn paid_at(pool: &PgPool, id: Uuid) -> Option<OffsetDateTime> {
    sqlx::query_scalar(r#"SELECT paid_at FROM transactions WHERE id = $1"#)
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Failed to read paid_at")
}

async fn active_grants(pool: &PgPool, user_id: Uuid) -> i64 {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM plan_grants WHERE user_id = $1 AND is_active"#)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count grants")
}

async fn profile_plan(pool: &PgPool, user_id: Uuid) -> String {
    sqlx::query_scalar(r#"SELECT plan FROM profiles WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read profile plan")
}

async fn available_balance(pool: &PgPool, user_id: Uuid) -> Decimal {
    sqlx::query_scalar(r#"SELECT available_balance FROM profiles WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read balance")
}

async fn cleanup(pool: &PgPool, user_id: Uuid) {
    for sql in [
        "DELETE FROM plan_grants WHERE user_id = $1",
        "DELETE FROM transactions WHERE user_id = $1",
        "DELETE FROM withdrawal_requests WHERE user_id = $1",
        "DELETE FROM profiles WHERE user_id = $1",
    ] {
        sqlx::query(sql)
            .bind(user_id)
            .execute(pool)
            .await
            .expect("Failed to clean up test data");
    }
}

fn unique_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

fn signed_suitpay_body(request_number: &str, status: &str) -> serde_json::Value {
    json!({
        "requestNumber": request_number,
        "statusTransaction": status,
        "hash": suitpay_webhook_hash(request_number, status, TEST_WEBHOOK_SECRET),
    })
}

// ============================================================================
// Test Cases: Payment Reconciliation
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn test_suitpay_paid_webhook_grants_plan_and_promotes_profile() {
    let (service, pool) = setup().await;

    // Given: a free user with a pending master purchase
    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Suitpay,
        &external_id,
        None,
        "master",
    )
    .await;

    // When: a correctly signed PAID_OUT webhook arrives
    let body = signed_suitpay_body(&external_id, "PAID_OUT");
    let outcome = service
        .engine()
        .reconcile(Provider::Suitpay, &external_id, "PAID_OUT", &body)
        .await
        .expect("reconcile should succeed");

    // Then: the transaction is paid, the plan granted, the profile promoted
    assert!(matches!(outcome, ReconcileOutcome::MarkedPaid(_)));
    assert_eq!(transaction_state(&pool, tx_id).await, "paid");
    assert!(paid_at(&pool, tx_id).await.is_some());
    assert_eq!(active_grants(&pool, user_id).await, 1);
    assert_eq!(profile_plan(&pool, user_id).await, "master");

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_replayed_paid_webhook_changes_nothing() {
    let (service, pool) = setup().await;

    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Suitpay,
        &external_id,
        None,
        "master",
    )
    .await;

    let body = signed_suitpay_body(&external_id, "PAID_OUT");
    service
        .engine()
        .reconcile(Provider::Suitpay, &external_id, "PAID_OUT", &body)
        .await
        .expect("first delivery should succeed");
    let first_paid_at = paid_at(&pool, tx_id).await;

    // When: the same webhook is delivered again
    let outcome = service
        .engine()
        .reconcile(Provider::Suitpay, &external_id, "PAID_OUT", &body)
        .await
        .expect("replay should succeed");

    // Then: the replay is a no-op success, not a second grant
    assert!(matches!(
        outcome,
        ReconcileOutcome::AlreadyTerminal(sinalpay_shared::TransactionState::Paid)
    ));
    assert_eq!(paid_at(&pool, tx_id).await, first_paid_at);
    assert_eq!(active_grants(&pool, user_id).await, 1);

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_cheaper_purchase_never_downgrades_profile() {
    let (service, pool) = setup().await;

    // Given: a premium user buying the cheaper master plan
    let user_id = create_profile(&pool, "premium", Decimal::ZERO).await;
    let external_id = unique_id("p");
    create_pending_transaction(
        &pool,
        user_id,
        Provider::Secretpay,
        &external_id,
        None,
        "master",
    )
    .await;

    let outcome = service
        .engine()
        .reconcile(Provider::Secretpay, &external_id, "aprovado", &json!({}))
        .await
        .expect("reconcile should succeed");

    // Then: the payment lands and grants, but the profile keeps premium
    assert!(matches!(outcome, ReconcileOutcome::MarkedPaid(_)));
    assert_eq!(profile_plan(&pool, user_id).await, "premium");
    assert_eq!(active_grants(&pool, user_id).await, 1);

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_unknown_status_token_leaves_transaction_pending() {
    let (service, pool) = setup().await;

    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Asaas,
        &external_id,
        None,
        "master",
    )
    .await;

    // When: the gateway invents a status token we have never seen
    let body = json!({"payment": {"id": external_id, "status": "SOMETHING_NEW"}});
    let outcome = service
        .engine()
        .reconcile(Provider::Asaas, &external_id, "SOMETHING_NEW", &body)
        .await
        .expect("reconcile should succeed");

    // Then: the transaction stays pending and the payload is kept for debugging
    assert!(matches!(outcome, ReconcileOutcome::StillPending));
    assert_eq!(transaction_state(&pool, tx_id).await, "pending");
    assert_eq!(active_grants(&pool, user_id).await, 0);

    let payload: Option<serde_json::Value> =
        sqlx::query_scalar(r#"SELECT raw_provider_payload FROM transactions WHERE id = $1"#)
            .bind(tx_id)
            .fetch_one(&pool)
            .await
            .expect("Failed to read payload");
    assert!(payload.is_some());

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_sixth_purchase_pays_but_grants_nothing() {
    let (service, pool) = setup().await;

    // Given: a user already holding the maximum of five active grants
    let user_id = create_profile(&pool, "master", Decimal::ZERO).await;
    for _ in 0..5 {
        sqlx::query(
            r#"
            INSERT INTO plan_grants (user_id, plan_name, is_active, purchase_date, daily_signals_used)
            VALUES ($1, 'master', TRUE, NOW(), 0)
            "#,
        )
        .bind(user_id)
        .execute(&pool)
        .await
        .expect("Failed to seed grants");
    }

    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Secretpay,
        &external_id,
        None,
        "master",
    )
    .await;

    let outcome = service
        .engine()
        .reconcile(Provider::Secretpay, &external_id, "aprovado", &json!({}))
        .await
        .expect("reconcile should succeed");

    // Then: the payment is still recorded as paid, just without a new grant
    match outcome {
        ReconcileOutcome::MarkedPaid(grant) => {
            assert!(!grant.grant_created);
            assert_eq!(grant.active_grants, 5);
        }
        other => panic!("expected MarkedPaid, got {:?}", other),
    }
    assert_eq!(transaction_state(&pool, tx_id).await, "paid");
    assert_eq!(active_grants(&pool, user_id).await, 5);

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_tampered_suitpay_webhook_is_rejected_without_mutation() {
    let (service, pool) = setup().await;

    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Suitpay,
        &external_id,
        None,
        "master",
    )
    .await;

    // When: an attacker forges a PAID_OUT webhook with a bogus hash
    let body = json!({
        "requestNumber": external_id,
        "statusTransaction": "PAID_OUT",
        "hash": "deadbeef",
    });
    let result = service
        .engine()
        .reconcile(Provider::Suitpay, &external_id, "PAID_OUT", &body)
        .await;

    // Then: authentication fails and the transaction is untouched
    assert!(matches!(result, Err(ReconError::AuthenticationFailed(_))));
    assert_eq!(transaction_state(&pool, tx_id).await, "pending");
    assert_eq!(active_grants(&pool, user_id).await, 0);

    let payload: Option<serde_json::Value> =
        sqlx::query_scalar(r#"SELECT raw_provider_payload FROM transactions WHERE id = $1"#)
            .bind(tx_id)
            .fetch_one(&pool)
            .await
            .expect("Failed to read payload");
    assert!(payload.is_none(), "rejected webhook must not be recorded on the row");

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_failed_webhook_after_paid_does_not_flip_state() {
    let (service, pool) = setup().await;

    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Secretpay,
        &external_id,
        None,
        "master",
    )
    .await;

    service
        .engine()
        .reconcile(Provider::Secretpay, &external_id, "aprovado", &json!({}))
        .await
        .expect("paid delivery should succeed");

    // When: a late out-of-order failure report arrives for the same payment
    let outcome = service
        .engine()
        .reconcile(Provider::Secretpay, &external_id, "cancelado", &json!({}))
        .await
        .expect("late delivery should still be a success");

    assert!(matches!(
        outcome,
        ReconcileOutcome::AlreadyTerminal(sinalpay_shared::TransactionState::Paid)
    ));
    assert_eq!(transaction_state(&pool, tx_id).await, "paid");

    cleanup(&pool, user_id).await;
}

// ============================================================================
// Test Cases: Polling Recovery
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn test_poll_recovers_payment_whose_webhook_was_lost() {
    // Given: an Asaas payment stuck pending and a gateway that says RECEIVED
    let mut server = mockito::Server::new_async().await;
    let (service, pool) = setup_with_asaas_url(&server.url()).await;

    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Asaas,
        &external_id,
        Some("pay_poll_1"),
        "master",
    )
    .await;

    let mock = server
        .mock("GET", "/payments/pay_poll_1")
        .match_header("access_token", "test_key")
        .with_status(200)
        .with_body(r#"{"id": "pay_poll_1", "status": "RECEIVED"}"#)
        .create_async()
        .await;

    // When: the client polls for the payment status
    let state = service
        .poller()
        .poll_status(Provider::Asaas, &external_id, None)
        .await
        .expect("poll should succeed");

    // Then: the payment reconciles to paid exactly as a webhook would
    assert_eq!(state, sinalpay_shared::TransactionState::Paid);
    assert_eq!(transaction_state(&pool, tx_id).await, "paid");
    assert_eq!(active_grants(&pool, user_id).await, 1);
    assert_eq!(profile_plan(&pool, user_id).await, "master");
    mock.assert_async().await;

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_poll_keeps_last_state_when_every_probe_fails() {
    let mut server = mockito::Server::new_async().await;
    let (service, pool) = setup_with_asaas_url(&server.url()).await;

    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Asaas,
        &external_id,
        Some("pay_poll_2"),
        "master",
    )
    .await;

    server
        .mock("GET", mockito::Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    // When: the gateway cannot resolve the payment through any probe
    let state = service
        .poller()
        .poll_status(Provider::Asaas, &external_id, None)
        .await
        .expect("poll should still succeed locally");

    // Then: the caller gets the last persisted state instead of an error
    assert_eq!(state, sinalpay_shared::TransactionState::Pending);
    assert_eq!(transaction_state(&pool, tx_id).await, "pending");

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_poll_scans_recent_transactions_for_unknown_id() {
    let mut server = mockito::Server::new_async().await;
    let (service, pool) = setup_with_asaas_url(&server.url()).await;

    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let external_id = unique_id("p");
    let tx_id = create_pending_transaction(
        &pool,
        user_id,
        Provider::Asaas,
        &external_id,
        Some("pay_poll_3"),
        "master",
    )
    .await;

    server
        .mock("GET", "/payments/pay_poll_3")
        .with_status(200)
        .with_body(r#"{"id": "pay_poll_3", "status": "CONFIRMED"}"#)
        .create_async()
        .await;

    // When: the client polls with an id we have no row for, but identifies
    // the user
    let state = service
        .poller()
        .poll_status(Provider::Asaas, "completely_unknown_id", Some(user_id))
        .await
        .expect("fallback scan should succeed");

    // Then: the user's recent pending transaction gets reconciled instead
    assert_eq!(state, sinalpay_shared::TransactionState::Paid);
    assert_eq!(transaction_state(&pool, tx_id).await, "paid");

    cleanup(&pool, user_id).await;
}

// ============================================================================
// Test Cases: Withdrawals
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn test_withdrawal_creation_debits_balance() {
    let (service, pool) = setup().await;

    let user_id = create_profile(&pool, "master", Decimal::new(10000, 2)).await;

    let request = service
        .withdrawals()
        .create(user_id, Decimal::new(4000, 2), "11999990000", PixKeyType::Phone)
        .await
        .expect("creation should succeed");

    assert_eq!(request.amount, Decimal::new(4000, 2));
    assert_eq!(available_balance(&pool, user_id).await, Decimal::new(6000, 2));

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_withdrawal_creation_rejects_insufficient_balance() {
    let (service, pool) = setup().await;

    let user_id = create_profile(&pool, "master", Decimal::new(10000, 2)).await;

    // When: the user asks for more than they have
    let result = service
        .withdrawals()
        .create(user_id, Decimal::new(15000, 2), "11999990000", PixKeyType::Phone)
        .await;

    // Then: nothing is written and the balance is untouched
    assert!(matches!(
        result,
        Err(ReconError::InsufficientBalance { .. })
    ));
    assert_eq!(
        available_balance(&pool, user_id).await,
        Decimal::new(10000, 2)
    );
    let rows: i64 =
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM withdrawal_requests WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .expect("Failed to count withdrawals");
    assert_eq!(rows, 0);

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_completed_transfer_stamps_processed_at() {
    let (service, pool) = setup().await;

    let user_id = create_profile(&pool, "master", Decimal::new(10000, 2)).await;
    let request = service
        .withdrawals()
        .create(user_id, Decimal::new(4000, 2), "11999990000", PixKeyType::Phone)
        .await
        .expect("creation should succeed");
    let transfer_id = unique_id("tr");
    attach_transfer(&pool, request.id, Provider::Asaas, &transfer_id).await;

    let body = json!({"transfer": {"id": transfer_id, "status": "DONE"}});
    let outcome = service
        .withdrawals()
        .reconcile(Provider::Asaas, &transfer_id, "DONE", &body)
        .await
        .expect("reconcile should succeed");

    assert!(matches!(outcome, WithdrawalOutcome::Completed));
    let processed_at: Option<OffsetDateTime> =
        sqlx::query_scalar(r#"SELECT processed_at FROM withdrawal_requests WHERE id = $1"#)
            .bind(request.id)
            .fetch_one(&pool)
            .await
            .expect("Failed to read processed_at");
    assert!(processed_at.is_some());
    // Completed transfers never refund
    assert_eq!(available_balance(&pool, user_id).await, Decimal::new(6000, 2));

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_rejected_transfer_refunds_exactly_once() {
    let (service, pool) = setup().await;

    // Given: a withdrawal in flight whose amount already left the balance
    let user_id = create_profile(&pool, "master", Decimal::new(10000, 2)).await;
    let request = service
        .withdrawals()
        .create(user_id, Decimal::new(4000, 2), "11999990000", PixKeyType::Phone)
        .await
        .expect("creation should succeed");
    let transfer_id = unique_id("tr");
    attach_transfer(&pool, request.id, Provider::Asaas, &transfer_id).await;
    assert_eq!(available_balance(&pool, user_id).await, Decimal::new(6000, 2));

    // When: the gateway reports FAILED, twice
    let body = json!({"transfer": {"id": transfer_id, "status": "FAILED"}});
    let first = service
        .withdrawals()
        .reconcile(Provider::Asaas, &transfer_id, "FAILED", &body)
        .await
        .expect("first delivery should succeed");
    let second = service
        .withdrawals()
        .reconcile(Provider::Asaas, &transfer_id, "FAILED", &body)
        .await
        .expect("replay should succeed");

    // Then: exactly one refund reaches the balance
    assert!(matches!(first, WithdrawalOutcome::Rejected { .. }));
    assert!(matches!(
        second,
        WithdrawalOutcome::AlreadyTerminal(sinalpay_shared::WithdrawalStatus::Rejected)
    ));
    assert_eq!(
        available_balance(&pool, user_id).await,
        Decimal::new(10000, 2)
    );

    cleanup(&pool, user_id).await;
}

// ============================================================================
// Worker sweep surface
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn test_stale_pending_scan_honors_age_window() {
    let (service, pool) = setup().await;

    let user_id = create_profile(&pool, "free", Decimal::ZERO).await;
    let fresh = create_pending_transaction(
        &pool,
        user_id,
        Provider::Secretpay,
        &unique_id("fresh"),
        None,
        "partner",
    )
    .await;
    let stale = create_pending_transaction(
        &pool,
        user_id,
        Provider::Secretpay,
        &unique_id("stale"),
        None,
        "partner",
    )
    .await;
    let expired = create_pending_transaction(
        &pool,
        user_id,
        Provider::Secretpay,
        &unique_id("expired"),
        None,
        "partner",
    )
    .await;

    // Age two of the rows past the window edges
    backdate_transaction(&pool, stale, "30 minutes").await;
    backdate_transaction(&pool, expired, "2 days").await;

    let rows = service
        .engine()
        .store()
        .stale_pending(15, 24, 200)
        .await
        .expect("scan should succeed");
    let ids: Vec<Uuid> = rows.iter().map(|t| t.id).collect();

    assert!(ids.contains(&stale));
    // Too young: the client poll still owns it
    assert!(!ids.contains(&fresh));
    // Too old: the PIX charge expired long ago
    assert!(!ids.contains(&expired));

    cleanup(&pool, user_id).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_event_retention_prunes_only_old_rows() {
    let (service, pool) = setup().await;

    let old_ref = unique_id("evt_old");
    let fresh_ref = unique_id("evt_new");
    sqlx::query(
        r#"
        INSERT INTO gateway_events (provider, external_ref, kind, outcome, created_at)
        VALUES
            ('secretpay', $1, 'payment', 'still_pending', NOW() - INTERVAL '120 days'),
            ('secretpay', $2, 'payment', 'still_pending', NOW())
        "#,
    )
    .bind(&old_ref)
    .bind(&fresh_ref)
    .execute(&pool)
    .await
    .expect("Failed to insert audit events");

    service
        .events()
        .delete_older_than(90)
        .await
        .expect("retention should succeed");

    let remaining: Vec<String> = sqlx::query_scalar(
        r#"SELECT external_ref FROM gateway_events WHERE external_ref IN ($1, $2)"#,
    )
    .bind(&old_ref)
    .bind(&fresh_ref)
    .fetch_all(&pool)
    .await
    .expect("Failed to read events");
    assert_eq!(remaining, vec![fresh_ref.clone()]);

    sqlx::query(r#"DELETE FROM gateway_events WHERE external_ref = $1"#)
        .bind(&fresh_ref)
        .execute(&pool)
        .await
        .expect("Failed to clean up events");
}
