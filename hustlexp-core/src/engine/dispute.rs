//! Dispute & Resolution (spec §4.7). Opening a dispute atomically locks the
//! escrow; resolution is the *only* path that releases an escrow out of
//! LOCKED_DISPUTE (P9) — payment ingestion never does.

use crate::error::{ErrorCode, HustleXpError, HustleXpResult};
use crate::models::{Dispute, DisputeResolutionOutcome, EscrowState};
use crate::outbox::write_to_outbox;
use crate::storage::repositories::{AdminRepository, DisputeRepository, EscrowRepository, TaskRepository, TrustRepository};
use crate::storage::Storage;
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct DisputeEngine {
    storage: Storage,
}

pub struct CreateDisputeParams {
    pub task_id: Uuid,
    pub escrow_id: Uuid,
    pub initiated_by: Uuid,
    pub poster_id: Uuid,
    pub worker_id: Uuid,
    pub reason: String,
}

/// Outcome passed to `resolve`. `Split` carries the validated split amounts.
pub enum ResolutionOutcome {
    Release,
    Refund,
    Split { refund_cents: i64, release_cents: i64 },
}

impl DisputeEngine {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// `create(...)` (spec §4.7): verifies the 48-hour post-completion
    /// window, inserts the dispute row, and locks the escrow — all in one
    /// transaction, so a failure anywhere rolls both back.
    pub async fn create(&self, params: CreateDisputeParams) -> HustleXpResult<Dispute> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;

        let task = TaskRepository::find_for_update(&mut tx, params.task_id).await?;
        if !task.is_within_dispute_window(chrono::Utc::now()) {
            return Err(HustleXpError::new(
                ErrorCode::InvalidState,
                "dispute window has closed (48 hours from task completion)",
            ));
        }

        let escrow = EscrowRepository::find_for_update(&mut tx, params.escrow_id).await?;
        escrow.state.validate_transition(EscrowState::LockedDispute)?;

        let dispute = DisputeRepository::create(
            &mut tx,
            params.task_id,
            params.escrow_id,
            params.initiated_by,
            params.poster_id,
            params.worker_id,
            &params.reason,
        )
        .await?;

        EscrowRepository::try_transition(
            &mut *tx,
            params.escrow_id,
            escrow.state,
            escrow.version,
            EscrowState::LockedDispute,
            "locked_at",
            None,
            None,
        )
        .await?
        .ok_or_else(|| HustleXpError::invalid_state("escrow changed before it could be locked for dispute"))?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        tracing::info!(dispute_id = %dispute.id, task_id = %params.task_id, "dispute opened, escrow locked");
        Ok(dispute)
    }

    pub async fn respond(&self, dispute_id: Uuid, _worker_id: Uuid, message: &str) -> HustleXpResult<Dispute> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let dispute = DisputeRepository::find_for_update(&mut tx, dispute_id).await?;

        let updated = DisputeRepository::respond(&mut tx, dispute_id, dispute.version, message)
            .await?
            .ok_or_else(|| HustleXpError::invalid_state("dispute state changed before response could be recorded"))?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }

    /// `resolve({disputeId, resolvedBy, outcome})` (spec §4.7): admin-gated
    /// on `admin_roles.can_resolve_disputes`. Tier/hold penalty effects on
    /// the losing party are NOT applied here — they're emitted as an
    /// outbox event and applied by a trust-worker consumer keyed on the
    /// idempotency key, matching the canonical fan-out pattern (§4.2).
    pub async fn resolve(&self, dispute_id: Uuid, resolved_by: Uuid, outcome: ResolutionOutcome) -> HustleXpResult<Dispute> {
        if !AdminRepository::can_resolve_disputes(self.storage.pool(), resolved_by).await? {
            return Err(HustleXpError::forbidden("caller lacks can_resolve_disputes capability"));
        }

        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let dispute = DisputeRepository::find_for_update(&mut tx, dispute_id).await?;
        if dispute.state.is_terminal() {
            return Err(HustleXpError::invalid_state("dispute is already resolved"));
        }

        let escrow = EscrowRepository::find_for_update(&mut tx, dispute.escrow_id).await?;
        if escrow.state != EscrowState::LockedDispute {
            return Err(HustleXpError::invalid_state("dispute can only be resolved while escrow is LOCKED_DISPUTE"));
        }

        let (outcome_tag, refund_cents, release_cents, to_state, timestamp_col) = match &outcome {
            ResolutionOutcome::Release => (DisputeResolutionOutcome::Release, None, None, EscrowState::Released, "released_at"),
            ResolutionOutcome::Refund => (DisputeResolutionOutcome::Refund, None, None, EscrowState::Refunded, "refunded_at"),
            ResolutionOutcome::Split { refund_cents, release_cents } => {
                if !escrow.split_sums_valid(*refund_cents, *release_cents) {
                    return Err(HustleXpError::invalid_state("refund_amount + release_amount must equal escrow.amount"));
                }
                (DisputeResolutionOutcome::Split, Some(*refund_cents), Some(*release_cents), EscrowState::RefundPartial, "refunded_at")
            }
        };

        let updated_dispute = DisputeRepository::resolve(
            &mut tx,
            dispute_id,
            dispute.version,
            resolved_by,
            outcome_tag,
            refund_cents,
            release_cents,
        )
        .await?
        .ok_or_else(|| HustleXpError::invalid_state("dispute changed during resolution"))?;

        let updated_escrow = if let ResolutionOutcome::Split { refund_cents, release_cents } = &outcome {
            EscrowRepository::try_partial_refund(
                &mut *tx,
                dispute.escrow_id,
                escrow.state,
                escrow.version,
                *refund_cents,
                *release_cents,
                &format!("dispute:{dispute_id}"),
            )
            .await?
        } else {
            EscrowRepository::try_transition(
                &mut *tx,
                dispute.escrow_id,
                escrow.state,
                escrow.version,
                to_state,
                timestamp_col,
                None,
                None,
            )
            .await?
        }
        .ok_or_else(|| HustleXpError::invalid_state("escrow changed during dispute resolution"))?;

        let idempotency_key = format!("dispute.resolved:{dispute_id}:{}", updated_dispute.version);
        write_to_outbox(
            &mut tx,
            "dispute.resolved",
            "dispute",
            dispute_id,
            updated_dispute.version as i32,
            &idempotency_key,
            json!({
                "dispute_id": dispute_id,
                "task_id": dispute.task_id,
                "escrow_id": dispute.escrow_id,
                "outcome": match outcome { ResolutionOutcome::Release => "release", ResolutionOutcome::Refund => "refund", ResolutionOutcome::Split { .. } => "split" },
                "worker_id": dispute.worker_id,
                "poster_id": dispute.poster_id,
                "escrow_version": updated_escrow.version,
            }),
            "critical_payments",
        )
        .await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated_dispute)
    }

    /// Applies the tier/hold penalty for a resolved dispute. Called by the
    /// trust-recompute worker consuming `dispute.resolved` outbox events;
    /// dedup is via the trust ledger's idempotency key (P8), so replaying
    /// the same outbox event twice never applies the penalty twice.
    pub async fn apply_resolution_penalty(
        &self,
        dispute_id: Uuid,
        penalized_user_id: Uuid,
        outcome_against_worker: bool,
    ) -> HustleXpResult<()> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let idempotency_key = format!("dispute.penalty:{dispute_id}:{penalized_user_id}");

        if outcome_against_worker {
            let user = crate::storage::repositories::UserRepository::find_for_update(&mut tx, penalized_user_id).await?;
            let demoted = demote(user.trust_tier);

            // Record the ledger entry first: `ON CONFLICT (idempotency_key)
            // DO NOTHING` makes the INSERT itself the dedup authority. Only
            // apply the tier change if this call actually inserted a new
            // row — a replayed outbox event (P8) must not demote twice.
            let inserted = TrustRepository::record_promotion(
                &mut tx,
                penalized_user_id,
                user.trust_tier,
                demoted,
                "dispute_penalty",
                &idempotency_key,
            )
            .await?;

            if inserted.is_some() && demoted != user.trust_tier {
                crate::storage::repositories::UserRepository::set_trust_tier(&mut tx, penalized_user_id, demoted).await?;
            }
        } else {
            // Two poster penalties within 30 days apply a 14-day hold. The
            // poster's tier itself doesn't move, but a ledger row is still
            // recorded (before == after) so this count query has something
            // to count.
            let user = crate::storage::repositories::UserRepository::find_for_update(&mut tx, penalized_user_id).await?;

            let recent_penalty_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM trust_ledger
                 WHERE user_id = $1 AND source = 'dispute_penalty' AND created_at > NOW() - INTERVAL '30 days'",
            )
            .bind(penalized_user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(HustleXpError::from)?;

            let inserted = TrustRepository::record_promotion(
                &mut tx,
                penalized_user_id,
                user.trust_tier,
                user.trust_tier,
                "dispute_penalty",
                &idempotency_key,
            )
            .await?;

            // Only apply the hold on the first application of this penalty;
            // a replay must not re-count toward the 30-day threshold.
            if inserted.is_some() && recent_penalty_count + 1 >= 2 {
                crate::storage::repositories::UserRepository::set_trust_hold(
                    &mut *tx,
                    penalized_user_id,
                    true,
                    Some("two poster penalties within 30 days"),
                    Some(chrono::Utc::now() + chrono::Duration::days(14)),
                )
                .await?;
            }
        }

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(())
    }
}

fn demote(tier: crate::models::TrustTier) -> crate::models::TrustTier {
    use crate::models::TrustTier::*;
    match tier {
        Elite => Trusted,
        Trusted => Verified,
        Verified => Rookie,
        Rookie => Rookie,
        Banned => Banned,
    }
}
