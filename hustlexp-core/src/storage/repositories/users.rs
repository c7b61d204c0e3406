use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{TrustTier, User};
use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

pub struct UserRepository;

impl UserRepository {
    pub async fn find<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> HustleXpResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("user {id} not found")))
    }

    pub async fn find_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> HustleXpResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("user {id} not found")))
    }

    /// Trust tier transitions happen only through the trust service; this
    /// helper is its sole write path (spec §3 invariant on User).
    pub async fn set_trust_tier(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        tier: TrustTier,
    ) -> HustleXpResult<()> {
        sqlx::query("UPDATE users SET trust_tier = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(tier)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn set_trust_hold<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        hold: bool,
        reason: Option<&str>,
        until: Option<chrono::DateTime<chrono::Utc>>,
    ) -> HustleXpResult<()> {
        sqlx::query(
            "UPDATE users
             SET trust_hold = $2, trust_hold_reason = $3, trust_hold_until = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(hold)
        .bind(reason)
        .bind(until)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn add_xp<'e>(executor: impl PgExecutor<'e>, id: Uuid, delta: i64) -> HustleXpResult<()> {
        sqlx::query("UPDATE users SET xp_total = xp_total + $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(executor)
            .await?;
        Ok(())
    }
}
