use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Derived per-user projection (spec §3, supplemented). Written only by the
/// capability recompute service — never by request handlers directly — so
/// that eligibility checks always read a consistent, explicitly-triggered
/// snapshot rather than recomputing trust/history inline on every request.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub user_id: Uuid,
    pub tasks_completed: i64,
    pub tasks_disputed: i64,
    pub tasks_disputed_against: i64,
    pub verified_trades: i64,
    pub current_streak_days: i32,
    pub recomputed_at: DateTime<Utc>,
}

/// One row per completed task that counts toward a worker's verified-trade
/// history; used by the recompute service to derive `verified_trades`
/// without re-scanning the full task table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VerifiedTrade {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub escrow_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}
