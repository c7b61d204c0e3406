use crate::error::HustleXpResult;
use crate::models::{TrustLedgerEntry, TrustTier};
use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

/// Read-side aggregates the trust promotion thresholds (spec §4.6) are
/// computed from, plus the append-only trust ledger write path.
pub struct TrustRepository;

impl TrustRepository {
    pub async fn completed_task_count<'e>(executor: impl PgExecutor<'e>, worker_id: Uuid) -> HustleXpResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks WHERE worker_id = $1 AND lifecycle_state = 'completed'",
        )
        .bind(worker_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn distinct_poster_count<'e>(executor: impl PgExecutor<'e>, worker_id: Uuid) -> HustleXpResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT owner_id) FROM tasks
             WHERE worker_id = $1 AND lifecycle_state = 'completed'",
        )
        .bind(worker_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Disputes where the user was the worker being disputed, regardless of
    /// outcome — the TRUSTED threshold requires zero of these (spec §4.6).
    pub async fn dispute_count_against<'e>(executor: impl PgExecutor<'e>, worker_id: Uuid) -> HustleXpResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM disputes WHERE worker_id = $1")
            .bind(worker_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    /// Fraction of completed tasks finished at or before `due_at` (tasks
    /// with no `due_at` count as on-time). `None` when the worker has no
    /// completed tasks yet.
    pub async fn on_time_rate<'e>(executor: impl PgExecutor<'e>, worker_id: Uuid) -> HustleXpResult<Option<f64>> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT
                COUNT(*) FILTER (WHERE due_at IS NULL OR completed_at <= due_at),
                COUNT(*)
             FROM tasks
             WHERE worker_id = $1 AND lifecycle_state = 'completed'",
        )
        .bind(worker_id)
        .fetch_one(executor)
        .await?;

        let (on_time, total) = row;
        if total == 0 {
            Ok(None)
        } else {
            Ok(Some(on_time as f64 / total as f64))
        }
    }

    /// Disputes the user opened as poster (spec §3, supplemented capability
    /// profile: `tasks_disputed` counts disputes raised, as distinct from
    /// `dispute_count_against`, which counts disputes the user was accused in).
    pub async fn dispute_count_initiated<'e>(executor: impl PgExecutor<'e>, poster_id: Uuid) -> HustleXpResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM disputes WHERE initiated_by = $1")
            .bind(poster_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    /// Count of completed tasks at TIER_2 or above — TRUSTED requires zero.
    pub async fn completed_tier2_plus_count<'e>(executor: impl PgExecutor<'e>, worker_id: Uuid) -> HustleXpResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks
             WHERE worker_id = $1 AND lifecycle_state = 'completed'
               AND risk_tier IN ('tier2', 'tier3')",
        )
        .bind(worker_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn record_promotion(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        before: TrustTier,
        after: TrustTier,
        source: &str,
        idempotency_key: &str,
    ) -> HustleXpResult<Option<TrustLedgerEntry>> {
        let row = sqlx::query_as::<_, TrustLedgerEntry>(
            "INSERT INTO trust_ledger (user_id, before_tier, after_tier, source, idempotency_key)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (idempotency_key) DO NOTHING
             RETURNING *",
        )
        .bind(user_id)
        .bind(before)
        .bind(after)
        .bind(source)
        .bind(idempotency_key)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Cancels every non-terminal task a user owns or works, for `banUser`
    /// (spec §4.6). Terminal tasks are already immutable (HX001) so this
    /// only ever touches rows the kernel would otherwise allow through.
    pub async fn cancel_active_tasks_for_banned_user(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> HustleXpResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE tasks
             SET lifecycle_state = 'cancelled', cancelled_at = NOW()
             WHERE (owner_id = $1 OR worker_id = $1)
               AND lifecycle_state NOT IN ('completed', 'cancelled', 'expired')
             RETURNING id",
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(ids)
    }
}
