//! Capability Profile recompute service (spec §3, supplemented). Explicitly
//! triggered — by task completion, dispute resolution, or an operator CLI
//! call — never by a scheduled sweep, so `capability_profiles` always
//! reflects a point the caller asked for rather than a stale periodic batch.

use crate::error::HustleXpResult;
use crate::models::CapabilityProfile;
use crate::storage::repositories::{CapabilityRepository, TaskRepository, TrustRepository};
use crate::storage::Storage;
use uuid::Uuid;

#[derive(Clone)]
pub struct RecomputeService {
    storage: Storage,
}

impl RecomputeService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Recomputes one user's projection. Also backfills any
    /// `verified_trades` rows for completed+released tasks the worker has
    /// accumulated since the last recompute.
    pub async fn recompute_for_user(&self, user_id: Uuid) -> HustleXpResult<CapabilityProfile> {
        let pool = self.storage.pool();

        for (task_id, escrow_id) in TaskRepository::completed_released_without_verified_trade(pool, user_id).await? {
            CapabilityRepository::record_verified_trade(pool, user_id, task_id, escrow_id).await?;
        }

        let tasks_completed = TrustRepository::completed_task_count(pool, user_id).await?;
        let tasks_disputed = TrustRepository::dispute_count_initiated(pool, user_id).await?;
        let tasks_disputed_against = TrustRepository::dispute_count_against(pool, user_id).await?;
        let verified_trades: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verified_trades WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .map_err(crate::error::HustleXpError::from)?;

        let user = crate::storage::repositories::UserRepository::find(pool, user_id).await?;

        CapabilityRepository::upsert(
            pool,
            user_id,
            tasks_completed,
            tasks_disputed,
            tasks_disputed_against,
            verified_trades,
            user.current_streak_days,
        )
        .await
    }
}
