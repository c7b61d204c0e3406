use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "proof_state", rename_all = "snake_case")]
pub enum ProofState {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Proof {
    pub id: Uuid,
    pub task_id: Uuid,
    pub submitter_id: Uuid,
    pub state: ProofState,
    pub description: Option<String>,
    pub media: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
