use crate::error::HustleXpResult;
use crate::models::{CapabilityProfile, VerifiedTrade};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Write path for the derived projections in spec §3. Only
/// [`crate::engine::RecomputeService`] calls these — resolution endpoints
/// never write `capability_profiles`/`verified_trades` directly.
pub struct CapabilityRepository;

impl CapabilityRepository {
    pub async fn upsert<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        tasks_completed: i64,
        tasks_disputed: i64,
        tasks_disputed_against: i64,
        verified_trades: i64,
        current_streak_days: i32,
    ) -> HustleXpResult<CapabilityProfile> {
        let row = sqlx::query_as::<_, CapabilityProfile>(
            "INSERT INTO capability_profiles
                (user_id, tasks_completed, tasks_disputed, tasks_disputed_against,
                 verified_trades, current_streak_days, recomputed_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW())
             ON CONFLICT (user_id) DO UPDATE
                SET tasks_completed = EXCLUDED.tasks_completed,
                    tasks_disputed = EXCLUDED.tasks_disputed,
                    tasks_disputed_against = EXCLUDED.tasks_disputed_against,
                    verified_trades = EXCLUDED.verified_trades,
                    current_streak_days = EXCLUDED.current_streak_days,
                    recomputed_at = NOW()
             RETURNING *",
        )
        .bind(user_id)
        .bind(tasks_completed)
        .bind(tasks_disputed)
        .bind(tasks_disputed_against)
        .bind(verified_trades)
        .bind(current_streak_days)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    pub async fn find<'e>(executor: impl PgExecutor<'e>, user_id: Uuid) -> HustleXpResult<Option<CapabilityProfile>> {
        let row = sqlx::query_as::<_, CapabilityProfile>(
            "SELECT * FROM capability_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn record_verified_trade<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        task_id: Uuid,
        escrow_id: Uuid,
    ) -> HustleXpResult<Option<VerifiedTrade>> {
        let row = sqlx::query_as::<_, VerifiedTrade>(
            "INSERT INTO verified_trades (user_id, task_id, escrow_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, task_id, escrow_id) DO NOTHING
             RETURNING *",
        )
        .bind(user_id)
        .bind(task_id)
        .bind(escrow_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }
}
