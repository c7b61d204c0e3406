use crate::error::HustleXpError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Primary business (lifecycle) state, spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_lifecycle_state", rename_all = "snake_case")]
pub enum TaskLifecycleState {
    Open,
    Matching,
    Accepted,
    ProofSubmitted,
    Disputed,
    Completed,
    Cancelled,
    Expired,
}

impl TaskLifecycleState {
    /// Terminal lifecycle states are immutable except for the one transition
    /// into them (spec §3, P5).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskLifecycleState::Completed | TaskLifecycleState::Cancelled | TaskLifecycleState::Expired
        )
    }

    /// Validate a lifecycle transition against the state machine pictured in
    /// spec §4.4. This mirrors the teacher's `Task::validate_transition` but
    /// against HustleXP's own state machine.
    pub fn validate_transition(self, to: TaskLifecycleState) -> Result<(), HustleXpError> {
        use TaskLifecycleState::*;
        let valid = matches!(
            (self, to),
            (Open, Accepted)
                | (Open, Cancelled)
                | (Open, Expired)
                | (Matching, Accepted)
                | (Matching, Cancelled)
                | (Matching, Expired)
                | (Accepted, ProofSubmitted)
                | (Accepted, Cancelled)
                | (Accepted, Expired)
                | (ProofSubmitted, Completed)
                | (ProofSubmitted, Accepted) // proof rejected, back to accepted
                | (ProofSubmitted, Disputed)
                | (Disputed, Completed)
                | (Disputed, Cancelled)
        );

        if valid {
            Ok(())
        } else {
            Err(HustleXpError::invalid_transition(
                &format!("{self:?}"),
                &format!("{to:?}"),
                "no such lifecycle transition",
            ))
        }
    }
}

/// Delivery-tracking axis, independent of lifecycle state (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_progress_state", rename_all = "snake_case")]
pub enum TaskProgressState {
    Posted,
    Accepted,
    Traveling,
    Working,
    Completed,
    Closed,
}

/// Who may drive a progress transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressActor {
    Worker,
    System,
}

impl TaskProgressState {
    /// The actor authorized to initiate each forward transition. `Accepted`
    /// and `Closed` are system-driven; the rest are worker-driven.
    pub fn required_actor(to: TaskProgressState) -> ProgressActor {
        match to {
            TaskProgressState::Accepted | TaskProgressState::Closed => ProgressActor::System,
            _ => ProgressActor::Worker,
        }
    }

    /// Legal forward transitions, per the linear progress axis in spec §4.4.
    /// `from == to` is handled by the caller as an idempotent no-op before
    /// this check runs.
    pub fn validate_transition(self, to: TaskProgressState) -> Result<(), HustleXpError> {
        use TaskProgressState::*;
        let valid = matches!(
            (self, to),
            (Posted, Accepted)
                | (Accepted, Traveling)
                | (Traveling, Working)
                | (Working, Completed)
                | (Completed, Closed)
        );

        if valid {
            Ok(())
        } else {
            Err(HustleXpError::invalid_transition(
                &format!("{self:?}"),
                &format!("{to:?}"),
                "no such progress transition",
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_mode", rename_all = "snake_case")]
pub enum TaskMode {
    Standard,
    Live,
}

impl TaskMode {
    pub fn minimum_price_cents(self) -> i64 {
        match self {
            TaskMode::Standard => 500,
            TaskMode::Live => 1500,
        }
    }

    /// Multiplier applied to XP awards for LIVE-mode tasks (spec §3).
    pub fn xp_multiplier(self) -> f64 {
        match self {
            TaskMode::Live => 1.25,
            TaskMode::Standard => 1.0,
        }
    }
}

/// Risk tiers for tasks (spec §4.6). `Tier3` is always blocked in alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_risk_tier", rename_all = "snake_case")]
pub enum TaskRiskTier {
    Tier0,
    Tier1,
    Tier2,
    Tier3,
}

impl TaskRiskTier {
    pub fn is_blocked_in_alpha(self) -> bool {
        self == TaskRiskTier::Tier3
    }

    /// Authoritative required-tier table, spec §4.6.
    pub fn required_trust_tier(self) -> Option<crate::models::TrustTier> {
        use crate::models::TrustTier;
        match self {
            TaskRiskTier::Tier0 | TaskRiskTier::Tier1 => Some(TrustTier::Verified),
            TaskRiskTier::Tier2 => Some(TrustTier::Trusted),
            TaskRiskTier::Tier3 => None, // always rejected, no tier clears it
        }
    }

    pub fn is_low_risk(self) -> bool {
        matches!(self, TaskRiskTier::Tier0)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub worker_id: Option<Uuid>,

    pub title: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub location: Option<String>,
    pub category: Option<String>,

    pub requires_proof: bool,
    pub risk_tier: TaskRiskTier,
    pub mode: TaskMode,
    pub instant_mode: bool,
    pub sensitive: bool,

    pub lifecycle_state: TaskLifecycleState,
    pub progress_state: TaskProgressState,

    pub recurring_series_id: Option<Uuid>,
    pub due_at: Option<DateTime<Utc>>,

    pub version: i64,

    pub accepted_at: Option<DateTime<Utc>>,
    pub proof_submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_within_dispute_window(&self, now: DateTime<Utc>) -> bool {
        match self.completed_at {
            Some(completed_at) => now - completed_at <= chrono::Duration::hours(48),
            None => false,
        }
    }
}
