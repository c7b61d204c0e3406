//! Task Engine (spec §4.4): two state machines on one row — the primary
//! lifecycle and the delivery-tracking progress axis — plus task creation
//! and the race-resolving single-UPDATE accept.

use crate::config::CoreConfig;
use crate::engine::gates::InstantModeGates;
use crate::engine::trust::TrustEngine;
use crate::error::{ErrorCode, HustleXpError, HustleXpResult};
use crate::models::{
    ProgressActor, ProofState, Task, TaskLifecycleState, TaskMode, TaskProgressState, TaskRiskTier, UserPlan,
};
use crate::outbox::write_to_outbox;
use crate::storage::repositories::{DisputeRepository, EscrowRepository, ProofRepository, TaskRepository, UserRepository};
use crate::storage::Storage;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct TaskEngine {
    storage: Storage,
    trust: TrustEngine,
    gates: Arc<dyn InstantModeGates>,
    config: CoreConfig,
}

/// Parameters to `create` (spec §4.4). `owner_id` is trusted; everything
/// else is caller input and gets validated before any row is written.
pub struct CreateTaskParams {
    pub owner_id: Uuid,
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
    pub recurring_series_id: Option<Uuid>,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TaskEngine {
    pub fn new(storage: Storage, trust: TrustEngine, gates: Arc<dyn InstantModeGates>, config: CoreConfig) -> Self {
        Self { storage, trust, gates, config }
    }

    /// `create(params)` (spec §4.4): positive integer price, minimum price
    /// per mode, risk/plan gating, and — for instant mode — the rate limit,
    /// kill switch, and AI completeness gate. Also creates the task's
    /// PENDING escrow in the same transaction: the data model guarantees
    /// exactly one escrow per task and there is no window where a task
    /// exists without one.
    pub async fn create(&self, params: CreateTaskParams) -> HustleXpResult<Task> {
        if params.price_cents <= 0 {
            return Err(HustleXpError::new(ErrorCode::InvalidState, "price must be a positive integer"));
        }
        let minimum = params.mode.minimum_price_cents();
        if params.price_cents < minimum {
            return Err(HustleXpError::price_too_low(format!(
                "{:?} mode requires price >= {minimum} cents, got {}",
                params.mode, params.price_cents
            )));
        }
        if params.mode == TaskMode::Live && params.price_cents < 1500 {
            return Err(HustleXpError::new(ErrorCode::Live2Violation, "LIVE mode requires price >= 1500 cents"));
        }
        if params.risk_tier.is_blocked_in_alpha() {
            return Err(HustleXpError::task_risk_blocked_alpha());
        }

        let owner = UserRepository::find(self.storage.pool(), params.owner_id).await?;
        if owner.is_banned() {
            return Err(HustleXpError::user_banned());
        }
        if owner.has_active_hold(chrono::Utc::now()) && !params.risk_tier.is_low_risk() {
            return Err(HustleXpError::forbidden("poster trust hold blocks non-LOW-risk task creation"));
        }
        if matches!(params.risk_tier, TaskRiskTier::Tier2) && owner.plan == UserPlan::Free {
            return Err(HustleXpError::new(ErrorCode::PlanRequired, "TIER_2 tasks require a paid plan"));
        }

        if params.instant_mode {
            if !self.gates.instant_mode_enabled() {
                return Err(HustleXpError::new(ErrorCode::RateLimitExceeded, "instant mode is disabled"));
            }
            self.gates.check_rate_limit(params.owner_id).await?;
            self.gates.check_task_completeness(&params.title, params.description.as_deref()).await?;
        }

        let initial_state = if params.instant_mode { TaskLifecycleState::Matching } else { TaskLifecycleState::Open };

        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let task = TaskRepository::create(
            &mut *tx,
            params.owner_id,
            &params.title,
            params.description.as_deref(),
            params.price_cents,
            params.location.as_deref(),
            params.category.as_deref(),
            params.requires_proof,
            params.risk_tier,
            params.mode,
            params.instant_mode,
            params.sensitive,
            initial_state,
            params.recurring_series_id,
            params.due_at,
        )
        .await?;

        EscrowRepository::create(&mut *tx, task.id, params.price_cents).await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        tracing::info!(task_id = %task.id, owner_id = %params.owner_id, "task created");
        Ok(task)
    }

    /// `accept(taskId, workerId)` (spec §4.4). `EligibilityGuard` is the
    /// only correct authority; instant mode layers kill-switch, rate-limit,
    /// and a higher minimum tier for sensitive tasks on top of it.
    pub async fn accept(&self, task_id: Uuid, worker_id: Uuid) -> HustleXpResult<Task> {
        let task = TaskRepository::find(self.storage.pool(), task_id).await?;
        let worker = UserRepository::find(self.storage.pool(), worker_id).await?;

        self.trust.assert_eligibility_for(&worker, &task)?;

        if worker.has_active_hold(chrono::Utc::now()) && !task.risk_tier.is_low_risk() {
            return Err(HustleXpError::forbidden("worker trust hold blocks non-LOW-risk task acceptance"));
        }

        if task.instant_mode {
            if !self.gates.instant_mode_enabled() {
                return Err(HustleXpError::new(ErrorCode::RateLimitExceeded, "instant mode is disabled"));
            }
            self.gates.check_rate_limit(worker_id).await?;

            let required = if task.sensitive { self.config.min_sensitive_instant_tier } else { self.config.min_instant_tier };
            if !worker.trust_tier.meets_minimum(required) {
                return Err(HustleXpError::with_details(
                    ErrorCode::InstantTaskTrustInsufficient,
                    "worker's trust tier is insufficient for instant-mode acceptance",
                    json!({ "user_tier": worker.trust_tier, "required_tier": required, "sensitive": task.sensitive }),
                ));
            }
        }

        // The sole race-resolver for concurrent accept (P6): whoever's
        // UPDATE matches `worker_id IS NULL` first wins; everyone else sees
        // zero rows.
        TaskRepository::try_accept(self.storage.pool(), task_id, worker_id)
            .await?
            .ok_or_else(|| HustleXpError::invalid_state("task already accepted"))
    }

    pub async fn submit_proof(
        &self,
        task_id: Uuid,
        submitter_id: Uuid,
        description: Option<&str>,
        media: Option<serde_json::Value>,
    ) -> HustleXpResult<Task> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let task = TaskRepository::find_for_update(&mut tx, task_id).await?;

        if task.worker_id != Some(submitter_id) {
            return Err(HustleXpError::forbidden("only the assigned worker may submit proof"));
        }
        task.lifecycle_state.validate_transition(TaskLifecycleState::ProofSubmitted)?;

        ProofRepository::create(&mut *tx, task_id, submitter_id, description, media).await?;
        let updated = TaskRepository::try_transition_lifecycle(
            &mut *tx,
            task_id,
            task.lifecycle_state,
            task.version,
            TaskLifecycleState::ProofSubmitted,
            "proof_submitted_at",
        )
        .await?
        .ok_or_else(|| HustleXpError::invalid_state("task state changed during proof submission"))?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }

    /// Rejects the submitted proof and returns the task to ACCEPTED so the
    /// worker can resubmit (spec §4.4 diagram: `ProofSubmitted -> Accepted`
    /// labeled "reject").
    pub async fn reject_proof(&self, task_id: Uuid, proof_id: Uuid, actor_id: Uuid) -> HustleXpResult<Task> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let task = TaskRepository::find_for_update(&mut tx, task_id).await?;

        if task.owner_id != actor_id {
            return Err(HustleXpError::forbidden("only the task owner may reject proof"));
        }
        task.lifecycle_state.validate_transition(TaskLifecycleState::Accepted)?;

        ProofRepository::set_state(&mut *tx, proof_id, ProofState::Rejected).await?;
        let updated = TaskRepository::try_transition_lifecycle(
            &mut *tx,
            task_id,
            task.lifecycle_state,
            task.version,
            TaskLifecycleState::Accepted,
            "accepted_at",
        )
        .await?
        .ok_or_else(|| HustleXpError::invalid_state("task state changed during proof rejection"))?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }

    /// `complete(taskId)` (spec §4.4): accepts the pending proof (if the
    /// task requires one) and transitions to COMPLETED in the same
    /// transaction, so the kernel's HX301 check sees the accepted proof
    /// that authorized the transition.
    pub async fn complete(&self, task_id: Uuid, proof_id: Option<Uuid>) -> HustleXpResult<Task> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let task = TaskRepository::find_for_update(&mut tx, task_id).await?;
        task.lifecycle_state.validate_transition(TaskLifecycleState::Completed)?;

        if task.requires_proof {
            let proof_id = proof_id.ok_or_else(|| {
                HustleXpError::invalid_state("task requires proof; no proof id supplied to complete")
            })?;
            ProofRepository::set_state(&mut *tx, proof_id, ProofState::Accepted).await?;
        }

        let updated = TaskRepository::try_transition_lifecycle(
            &mut *tx,
            task_id,
            task.lifecycle_state,
            task.version,
            TaskLifecycleState::Completed,
            "completed_at",
        )
        .await? // HX301 surfaces here if no ACCEPTED proof exists
        .ok_or_else(|| HustleXpError::invalid_state("task state changed during completion"))?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }

    /// Pre-completion lifecycle dispute (`ProofSubmitted -> Disputed`) —
    /// distinct from the marketplace `disputes` table resolved by
    /// [`crate::engine::DisputeEngine`], which operates on an already
    /// COMPLETED task's escrow. This one exists for proof disagreements
    /// before the task is ever marked complete.
    pub async fn open_lifecycle_dispute(&self, task_id: Uuid) -> HustleXpResult<Task> {
        let task = TaskRepository::find(self.storage.pool(), task_id).await?;
        task.lifecycle_state.validate_transition(TaskLifecycleState::Disputed)?;

        TaskRepository::try_transition_lifecycle(
            self.storage.pool(),
            task_id,
            task.lifecycle_state,
            task.version,
            TaskLifecycleState::Disputed,
            "updated_at",
        )
        .await?
        .ok_or_else(|| HustleXpError::invalid_state("task state changed before dispute could open"))
    }

    pub async fn cancel(&self, task_id: Uuid) -> HustleXpResult<Task> {
        let task = TaskRepository::find(self.storage.pool(), task_id).await?;
        task.lifecycle_state.validate_transition(TaskLifecycleState::Cancelled)?;

        TaskRepository::try_transition_lifecycle(
            self.storage.pool(),
            task_id,
            task.lifecycle_state,
            task.version,
            TaskLifecycleState::Cancelled,
            "cancelled_at",
        )
        .await?
        .ok_or_else(|| HustleXpError::invalid_state("task state changed before it could be cancelled"))
    }

    pub async fn expire(&self, task_id: Uuid) -> HustleXpResult<Task> {
        let task = TaskRepository::find(self.storage.pool(), task_id).await?;
        task.lifecycle_state.validate_transition(TaskLifecycleState::Expired)?;

        TaskRepository::try_transition_lifecycle(
            self.storage.pool(),
            task_id,
            task.lifecycle_state,
            task.version,
            TaskLifecycleState::Expired,
            "expired_at",
        )
        .await?
        .ok_or_else(|| HustleXpError::invalid_state("task state changed before it could expire"))
    }

    /// `advanceProgress(taskId, to, actor)` (spec §4.4): FOR UPDATE, then
    /// idempotent no-op, legal-transition check, actor authority, dispute
    /// freeze, escrow-terminal freeze (both excepting the CLOSED pin), then
    /// the conditional UPDATE.
    pub async fn advance_progress(
        &self,
        task_id: Uuid,
        to: TaskProgressState,
        actor: ProgressActor,
    ) -> HustleXpResult<Task> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let task = TaskRepository::find_for_update(&mut tx, task_id).await?;

        if task.progress_state == to {
            tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
            return Ok(task); // idempotent no-op
        }

        task.progress_state.validate_transition(to)?;

        let required_actor = TaskProgressState::required_actor(to);
        if required_actor != actor {
            return Err(HustleXpError::forbidden(format!(
                "progress transition to {to:?} requires actor {required_actor:?}, got {actor:?}"
            )));
        }

        if to != TaskProgressState::Closed {
            let has_active_dispute = DisputeRepository::has_active_dispute_for_task(&mut tx, task_id).await?;
            if has_active_dispute {
                return Err(HustleXpError::invalid_state("progress is frozen while a dispute is active"));
            }

            if let Ok(escrow) = EscrowRepository::find_by_task(&mut *tx, task_id).await {
                if escrow.state.is_terminal() {
                    return Err(HustleXpError::invalid_state("progress is frozen once escrow reaches a terminal state"));
                }
            }
        }

        let updated = TaskRepository::try_advance_progress(&mut *tx, task_id, task.version, to)
            .await?
            .ok_or_else(|| HustleXpError::invalid_state("task version changed during progress advance"))?;

        write_to_outbox(
            &mut tx,
            "task.progress_updated",
            "task",
            task_id,
            updated.version as i32,
            &format!("task.progress_updated:{task_id}:{to:?}"),
            json!({ "task_id": task_id, "to": to }),
            "user_notifications",
        )
        .await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(updated)
    }
}
