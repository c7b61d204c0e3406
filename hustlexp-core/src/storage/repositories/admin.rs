use crate::error::HustleXpResult;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Admin role capability flags (spec §6). `resolve` is gated on
/// `admin_roles.can_resolve_disputes` — a capability check on the admin
/// role row, not on a caller-supplied claim.
pub struct AdminRepository;

impl AdminRepository {
    pub async fn can_resolve_disputes<'e>(executor: impl PgExecutor<'e>, user_id: Uuid) -> HustleXpResult<bool> {
        let flag: Option<bool> = sqlx::query_scalar(
            "SELECT can_resolve_disputes FROM admin_roles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(flag.unwrap_or(false))
    }
}
