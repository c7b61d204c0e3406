use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispute_state", rename_all = "snake_case")]
pub enum DisputeState {
    Open,
    UnderReview,
    Resolved,
}

impl DisputeState {
    pub fn is_terminal(self) -> bool {
        self == DisputeState::Resolved
    }
}

/// Admin resolution outcome (spec §4.7). `Split` carries the refund/release
/// split and is validated by the resolution service, not by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolutionOutcome {
    Release,
    Refund,
    Split,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    pub task_id: Uuid,
    pub escrow_id: Uuid,
    pub initiated_by: Uuid,
    pub poster_id: Uuid,
    pub worker_id: Uuid,
    pub reason: String,
    pub state: DisputeState,
    pub version: i64,
    pub evidence: Option<serde_json::Value>,
    pub resolution_outcome: Option<DisputeResolutionOutcome>,
    pub resolution_refund_cents: Option<i64>,
    pub resolution_release_cents: Option<i64>,
    pub resolved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
