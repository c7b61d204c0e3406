use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{Task, TaskLifecycleState, TaskProgressState};
use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

pub struct TaskRepository;

impl TaskRepository {
    #[allow(clippy::too_many_arguments)]
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        owner_id: Uuid,
        title: &str,
        description: Option<&str>,
        price_cents: i64,
        location: Option<&str>,
        category: Option<&str>,
        requires_proof: bool,
        risk_tier: crate::models::TaskRiskTier,
        mode: crate::models::TaskMode,
        instant_mode: bool,
        sensitive: bool,
        initial_state: TaskLifecycleState,
        recurring_series_id: Option<Uuid>,
        due_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> HustleXpResult<Task> {
        let row = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks
                (owner_id, title, description, price_cents, location, category,
                 requires_proof, risk_tier, mode, instant_mode, sensitive,
                 lifecycle_state, recurring_series_id, due_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING *",
        )
        .bind(owner_id)
        .bind(title)
        .bind(description)
        .bind(price_cents)
        .bind(location)
        .bind(category)
        .bind(requires_proof)
        .bind(risk_tier)
        .bind(mode)
        .bind(instant_mode)
        .bind(sensitive)
        .bind(initial_state)
        .bind(recurring_series_id)
        .bind(due_at)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    pub async fn create_recurring_series<'e>(executor: impl PgExecutor<'e>, owner_id: Uuid) -> HustleXpResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO recurring_task_series (owner_id) VALUES ($1) RETURNING id",
        )
        .bind(owner_id)
        .fetch_one(executor)
        .await?;
        Ok(id)
    }

    pub async fn find<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> HustleXpResult<Task> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("task {id} not found")))
    }

    pub async fn find_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> HustleXpResult<Task> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("task {id} not found")))
    }

    /// Single conditional UPDATE carrying `WHERE state IN (...) AND
    /// worker_id IS NULL`; the race-resolver for concurrent accept (§4.4,
    /// P6). Zero rows returned means the caller lost the race.
    pub async fn try_accept<'e>(
        executor: impl PgExecutor<'e>,
        task_id: Uuid,
        worker_id: Uuid,
    ) -> HustleXpResult<Option<Task>> {
        let row = sqlx::query_as::<_, Task>(
            "UPDATE tasks
             SET lifecycle_state = 'accepted', progress_state = 'accepted',
                 worker_id = $2, accepted_at = NOW()
             WHERE id = $1
               AND lifecycle_state IN ('open', 'matching')
               AND worker_id IS NULL
             RETURNING *",
        )
        .bind(task_id)
        .bind(worker_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Generic conditional lifecycle UPDATE carrying `WHERE id = :id AND
    /// lifecycle_state = :expected AND version = :expected_version`.
    pub async fn try_transition_lifecycle<'e>(
        executor: impl PgExecutor<'e>,
        task_id: Uuid,
        expected_state: TaskLifecycleState,
        expected_version: i64,
        to: TaskLifecycleState,
        timestamp_column: &str,
    ) -> HustleXpResult<Option<Task>> {
        let sql = format!(
            "UPDATE tasks
             SET lifecycle_state = $4, {timestamp_column} = NOW()
             WHERE id = $1 AND lifecycle_state = $2 AND version = $3
             RETURNING *"
        );

        let row = sqlx::query_as::<_, Task>(&sql)
            .bind(task_id)
            .bind(expected_state)
            .bind(expected_version)
            .bind(to)
            .fetch_optional(executor)
            .await?;

        Ok(row)
    }

    /// Completed tasks with a released escrow the recompute service hasn't
    /// yet recorded a `verified_trades` row for (spec §3, supplemented).
    pub async fn completed_released_without_verified_trade<'e>(
        executor: impl PgExecutor<'e>,
        worker_id: Uuid,
    ) -> HustleXpResult<Vec<(Uuid, Uuid)>> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT t.id, e.id
             FROM tasks t
             JOIN escrows e ON e.task_id = t.id
             WHERE t.worker_id = $1
               AND t.lifecycle_state = 'completed'
               AND e.state = 'released'
               AND NOT EXISTS (
                   SELECT 1 FROM verified_trades vt
                   WHERE vt.task_id = t.id AND vt.escrow_id = e.id AND vt.user_id = $1
               )",
        )
        .bind(worker_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn try_advance_progress<'e>(
        executor: impl PgExecutor<'e>,
        task_id: Uuid,
        expected_version: i64,
        to: TaskProgressState,
    ) -> HustleXpResult<Option<Task>> {
        let row = sqlx::query_as::<_, Task>(
            "UPDATE tasks
             SET progress_state = $3
             WHERE id = $1 AND version = $2
             RETURNING *",
        )
        .bind(task_id)
        .bind(expected_version)
        .bind(to)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }
}
