use crate::error::HustleXpError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Escrow state machine, spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "escrow_state", rename_all = "snake_case")]
pub enum EscrowState {
    Pending,
    Funded,
    LockedDispute,
    Released,
    Refunded,
    RefundPartial,
}

impl EscrowState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EscrowState::Released | EscrowState::Refunded | EscrowState::RefundPartial
        )
    }

    /// Mirrors the teacher's per-row `validate_transition`, adapted to
    /// HustleXP's escrow state machine (spec §4.3 diagram).
    pub fn validate_transition(self, to: EscrowState) -> Result<(), HustleXpError> {
        use EscrowState::*;
        let valid = matches!(
            (self, to),
            (Pending, Funded)
                | (Funded, Released)
                | (Funded, Refunded)
                | (Funded, RefundPartial)
                | (Funded, LockedDispute)
                | (LockedDispute, Released)
                | (LockedDispute, Refunded)
                | (LockedDispute, RefundPartial)
        );

        if valid {
            Ok(())
        } else {
            Err(HustleXpError::invalid_transition(
                &format!("{self:?}"),
                &format!("{to:?}"),
                "no such escrow transition",
            ))
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Escrow {
    pub id: Uuid,
    pub task_id: Uuid,

    /// Immutable after INSERT (HX004).
    pub amount_cents: i64,
    pub state: EscrowState,

    pub external_payment_intent_id: Option<String>,
    pub external_transfer_id: Option<String>,
    pub external_refund_id: Option<String>,

    pub refund_amount_cents: Option<i64>,
    pub release_amount_cents: Option<i64>,

    pub version: i64,

    pub funded_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Escrow {
    /// P10: for REFUND_PARTIAL, refund_amount + release_amount == amount.
    pub fn split_sums_valid(&self, refund_amount: i64, release_amount: i64) -> bool {
        refund_amount + release_amount == self.amount_cents
    }
}
