//! Escrow Engine (spec §4.3). Every mutation is a single conditional UPDATE
//! carrying `WHERE state = :expected AND version = :expected_version`; zero
//! rows returned means the caller lost a race and must re-read before
//! retrying.

use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{Escrow, EscrowState};
use crate::outbox::write_to_outbox;
use crate::storage::repositories::EscrowRepository;
use crate::storage::Storage;
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct EscrowEngine {
    storage: Storage,
}

impl EscrowEngine {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub async fn create(&self, task_id: Uuid, amount_cents: i64) -> HustleXpResult<Escrow> {
        if amount_cents <= 0 {
            return Err(HustleXpError::invalid_state("escrow amount must be positive"));
        }
        EscrowRepository::create(self.storage.pool(), task_id, amount_cents).await
    }

    pub async fn fund(&self, escrow_id: Uuid, external_intent_id: &str) -> HustleXpResult<Escrow> {
        let current = EscrowRepository::find(self.storage.pool(), escrow_id).await?;
        current.state.validate_transition(EscrowState::Funded)?;

        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let updated = EscrowRepository::try_transition(
            &mut *tx,
            escrow_id,
            current.state,
            current.version,
            EscrowState::Funded,
            "funded_at",
            Some("external_payment_intent_id"),
            Some(external_intent_id),
        )
        .await?
        .ok_or_else(race_lost)?;

        write_to_outbox(
            &mut tx,
            "escrow.funded",
            "escrow",
            escrow_id,
            updated.version as i32,
            &format!("escrow.funded:{escrow_id}:{}", updated.version),
            json!({ "escrow_id": escrow_id, "task_id": updated.task_id, "amount_cents": updated.amount_cents }),
            "critical_payments",
        )
        .await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }

    pub async fn release(&self, escrow_id: Uuid) -> HustleXpResult<Escrow> {
        let current = EscrowRepository::find(self.storage.pool(), escrow_id).await?;
        current.state.validate_transition(EscrowState::Released)?;

        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let updated = EscrowRepository::try_transition(
            &mut *tx,
            escrow_id,
            current.state,
            current.version,
            EscrowState::Released,
            "released_at",
            None,
            None,
        )
        .await?
        .ok_or_else(race_lost)?;

        write_to_outbox(
            &mut tx,
            "escrow.released",
            "escrow",
            escrow_id,
            updated.version as i32,
            &format!("escrow.released:{escrow_id}:{}", updated.version),
            json!({ "escrow_id": escrow_id, "task_id": updated.task_id }),
            "critical_payments",
        )
        .await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }

    pub async fn refund(&self, escrow_id: Uuid, external_refund_id: &str) -> HustleXpResult<Escrow> {
        let current = EscrowRepository::find(self.storage.pool(), escrow_id).await?;
        current.state.validate_transition(EscrowState::Refunded)?;

        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let updated = EscrowRepository::try_transition(
            &mut *tx,
            escrow_id,
            current.state,
            current.version,
            EscrowState::Refunded,
            "refunded_at",
            Some("external_refund_id"),
            Some(external_refund_id),
        )
        .await?
        .ok_or_else(race_lost)?;

        write_to_outbox(
            &mut tx,
            "escrow.refunded",
            "escrow",
            escrow_id,
            updated.version as i32,
            &format!("escrow.refunded:{escrow_id}:{}", updated.version),
            json!({ "escrow_id": escrow_id, "task_id": updated.task_id }),
            "critical_payments",
        )
        .await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }

    pub async fn partial_refund(
        &self,
        escrow_id: Uuid,
        external_refund_id: &str,
        refund_amount_cents: i64,
        release_amount_cents: i64,
    ) -> HustleXpResult<Escrow> {
        let current = EscrowRepository::find(self.storage.pool(), escrow_id).await?;
        current.state.validate_transition(EscrowState::RefundPartial)?;

        if !current.split_sums_valid(refund_amount_cents, release_amount_cents) {
            return Err(HustleXpError::invalid_state(
                "refund_amount + release_amount must equal escrow.amount",
            ));
        }

        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let updated = EscrowRepository::try_partial_refund(
            &mut *tx,
            escrow_id,
            current.state,
            current.version,
            refund_amount_cents,
            release_amount_cents,
            external_refund_id,
        )
        .await?
        .ok_or_else(race_lost)?;

        write_to_outbox(
            &mut tx,
            "escrow.refund_partial",
            "escrow",
            escrow_id,
            updated.version as i32,
            &format!("escrow.refund_partial:{escrow_id}:{}", updated.version),
            json!({
                "escrow_id": escrow_id,
                "task_id": updated.task_id,
                "refund_amount_cents": refund_amount_cents,
                "release_amount_cents": release_amount_cents,
            }),
            "critical_payments",
        )
        .await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }

    pub async fn lock_for_dispute(&self, escrow_id: Uuid) -> HustleXpResult<Escrow> {
        let current = EscrowRepository::find(self.storage.pool(), escrow_id).await?;
        current.state.validate_transition(EscrowState::LockedDispute)?;

        let updated = EscrowRepository::try_transition(
            self.storage.pool(),
            escrow_id,
            current.state,
            current.version,
            EscrowState::LockedDispute,
            "locked_at",
            None,
            None,
        )
        .await?
        .ok_or_else(race_lost)?;

        Ok(updated)
    }
}

fn race_lost() -> HustleXpError {
    HustleXpError::invalid_state("version or state changed during update")
}
