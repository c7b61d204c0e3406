use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{Dispute, DisputeResolutionOutcome};
use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

pub struct DisputeRepository;

impl DisputeRepository {
    pub async fn find<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> HustleXpResult<Dispute> {
        sqlx::query_as::<_, Dispute>("SELECT * FROM disputes WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("dispute {id} not found")))
    }

    /// Backs the Task Engine's progress freeze (spec §4.4): progress is
    /// frozen while any dispute on the task has not reached RESOLVED.
    pub async fn has_active_dispute_for_task(
        tx: &mut Transaction<'_, Postgres>,
        task_id: Uuid,
    ) -> HustleXpResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM disputes WHERE task_id = $1 AND state <> 'resolved')",
        )
        .bind(task_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    pub async fn find_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> HustleXpResult<Dispute> {
        sqlx::query_as::<_, Dispute>("SELECT * FROM disputes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("dispute {id} not found")))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        task_id: Uuid,
        escrow_id: Uuid,
        initiated_by: Uuid,
        poster_id: Uuid,
        worker_id: Uuid,
        reason: &str,
    ) -> HustleXpResult<Dispute> {
        let row = sqlx::query_as::<_, Dispute>(
            "INSERT INTO disputes (task_id, escrow_id, initiated_by, poster_id, worker_id, reason)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(task_id)
        .bind(escrow_id)
        .bind(initiated_by)
        .bind(poster_id)
        .bind(worker_id)
        .bind(reason)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Appends the worker's response as another element in the `evidence`
    /// array and moves OPEN -> UNDER_REVIEW.
    pub async fn respond(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        expected_version: i64,
        message: &str,
    ) -> HustleXpResult<Option<Dispute>> {
        let row = sqlx::query_as::<_, Dispute>(
            "UPDATE disputes
             SET state = 'under_review',
                 evidence = COALESCE(evidence, '[]'::jsonb) || jsonb_build_array(
                     jsonb_build_object('message', $3::text, 'at', NOW())
                 )
             WHERE id = $1 AND state = 'open' AND version = $2
             RETURNING *",
        )
        .bind(id)
        .bind(expected_version)
        .bind(message)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn resolve(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        expected_version: i64,
        resolved_by: Uuid,
        outcome: DisputeResolutionOutcome,
        refund_cents: Option<i64>,
        release_cents: Option<i64>,
    ) -> HustleXpResult<Option<Dispute>> {
        let outcome_str = match outcome {
            DisputeResolutionOutcome::Release => "release",
            DisputeResolutionOutcome::Refund => "refund",
            DisputeResolutionOutcome::Split => "split",
        };

        let row = sqlx::query_as::<_, Dispute>(
            "UPDATE disputes
             SET state = 'resolved',
                 resolved_by = $3,
                 resolution_outcome = $4,
                 resolution_refund_cents = $5,
                 resolution_release_cents = $6,
                 resolved_at = NOW()
             WHERE id = $1 AND state <> 'resolved' AND version = $2
             RETURNING *",
        )
        .bind(id)
        .bind(expected_version)
        .bind(resolved_by)
        .bind(outcome_str)
        .bind(refund_cents)
        .bind(release_cents)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }
}
