//! Plan grant and profile promotion fan-out for paid transactions
//!
//! These helpers run inside the caller's transaction, after the pending ->
//! paid compare-and-set succeeded. Per-user serialization comes from a
//! transaction-scoped advisory lock, so rank comparison and the grant-cap
//! count stay race-free without table-level locking.

use sqlx::PgConnection;
use uuid::Uuid;

use sinalpay_shared::PlanTier;

use crate::error::ReconResult;

/// A user holds at most this many simultaneously active grants.
pub const MAX_ACTIVE_GRANTS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantOutcome {
    pub plan_promoted: bool,
    pub grant_created: bool,
    pub active_grants: i64,
}

/// Take the per-user advisory lock. Transaction scoped, released
/// automatically at COMMIT or ROLLBACK.
pub async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> ReconResult<()> {
    sqlx::query(r#"SELECT pg_advisory_xact_lock(hashtext($1::text))"#)
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Apply the plan side effects of a purchase that just became paid.
///
/// Promotes the profile only when the purchased tier ranks at or above the
/// current one, so a cheaper purchase never downgrades anyone. Inserts a
/// grant unless the user already sits at the active-grant cap; a capped
/// purchase still counts as paid, it just grants nothing extra.
pub async fn activate_purchase(
    conn: &mut PgConnection,
    user_id: Uuid,
    plan_name: &str,
) -> ReconResult<GrantOutcome> {
    let purchased = PlanTier::from_str_lossy(plan_name);

    let current: Option<String> =
        sqlx::query_scalar(r#"SELECT plan FROM profiles WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    let plan_promoted = match current {
        Some(plan) => {
            if PlanTier::from_str_lossy(&plan).allows_promotion_to(purchased) {
                sqlx::query(
                    r#"
                    UPDATE profiles
                    SET plan = $2, updated_at = NOW()
                    WHERE user_id = $1
                    "#,
                )
                .bind(user_id)
                .bind(purchased.to_string())
                .execute(&mut *conn)
                .await?;
                true
            } else {
                false
            }
        }
        None => {
            // First purchase can land before the profile row exists. A
            // concurrent signup only ever writes 'free', so overwriting on
            // conflict cannot lose a higher tier.
            sqlx::query(
                r#"
                INSERT INTO profiles (user_id, plan)
                VALUES ($1, $2)
                ON CONFLICT (user_id) DO UPDATE SET plan = $2, updated_at = NOW()
                "#,
            )
            .bind(user_id)
            .bind(purchased.to_string())
            .execute(&mut *conn)
            .await?;
            true
        }
    };

    let active_grants: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM plan_grants WHERE user_id = $1 AND is_active"#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let grant_created = if active_grants < MAX_ACTIVE_GRANTS {
        sqlx::query(
            r#"
            INSERT INTO plan_grants (user_id, plan_name, is_active, purchase_date, daily_signals_used)
            VALUES ($1, $2, TRUE, NOW(), 0)
            "#,
        )
        .bind(user_id)
        .bind(plan_name)
        .execute(&mut *conn)
        .await?;
        true
    } else {
        false
    };

    Ok(GrantOutcome {
        plan_promoted,
        grant_created,
        active_grants: if grant_created {
            active_grants + 1
        } else {
            active_grants
        },
    })
}
