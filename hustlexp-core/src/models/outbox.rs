use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Named external queues the dispatcher routes into (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxQueue {
    CriticalPayments,
    UserNotifications,
    TrustRecompute,
    Default,
}

impl OutboxQueue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CriticalPayments => "critical_payments",
            Self::UserNotifications => "user_notifications",
            Self::TrustRecompute => "trust_recompute",
            Self::Default => "default",
        }
    }
}

/// Transactional outbox row (spec §4.2). Written in the same DB transaction
/// as the state change it announces; claimed by the dispatcher via an
/// atomic `UPDATE ... WHERE claimed_at IS NULL` and marked dispatched only
/// after the downstream enqueue succeeds.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub event_version: i32,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub queue: String,

    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some() && self.dispatched_at.is_none()
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }
}
