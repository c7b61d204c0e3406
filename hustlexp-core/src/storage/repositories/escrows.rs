use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{Escrow, EscrowState};
use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

pub struct EscrowRepository;

impl EscrowRepository {
    pub async fn find<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> HustleXpResult<Escrow> {
        sqlx::query_as::<_, Escrow>("SELECT * FROM escrows WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("escrow {id} not found")))
    }

    pub async fn find_by_task<'e>(executor: impl PgExecutor<'e>, task_id: Uuid) -> HustleXpResult<Escrow> {
        sqlx::query_as::<_, Escrow>("SELECT * FROM escrows WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("escrow for task {task_id} not found")))
    }

    pub async fn find_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> HustleXpResult<Escrow> {
        sqlx::query_as::<_, Escrow>("SELECT * FROM escrows WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| HustleXpError::not_found(format!("escrow {id} not found")))
    }

    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        task_id: Uuid,
        amount_cents: i64,
    ) -> HustleXpResult<Escrow> {
        let row = sqlx::query_as::<_, Escrow>(
            "INSERT INTO escrows (task_id, amount_cents, state) VALUES ($1, $2, 'pending') RETURNING *",
        )
        .bind(task_id)
        .bind(amount_cents)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Every mutation carries `WHERE id = :id AND state = :expected AND
    /// version = :expected_version` (§4.3). Zero rows ⇒ "version or state
    /// changed during update".
    #[allow(clippy::too_many_arguments)]
    pub async fn try_transition<'e>(
        executor: impl PgExecutor<'e>,
        escrow_id: Uuid,
        expected_state: EscrowState,
        expected_version: i64,
        to: EscrowState,
        timestamp_column: &str,
        external_ref_column: Option<&str>,
        external_ref_value: Option<&str>,
    ) -> HustleXpResult<Option<Escrow>> {
        let sql = match external_ref_column {
            Some(col) => format!(
                "UPDATE escrows
                 SET state = $4, {timestamp_column} = NOW(), {col} = $5
                 WHERE id = $1 AND state = $2 AND version = $3
                 RETURNING *"
            ),
            None => format!(
                "UPDATE escrows
                 SET state = $4, {timestamp_column} = NOW()
                 WHERE id = $1 AND state = $2 AND version = $3
                 RETURNING *"
            ),
        };

        let mut query = sqlx::query_as::<_, Escrow>(&sql)
            .bind(escrow_id)
            .bind(expected_state)
            .bind(expected_version)
            .bind(to);

        if external_ref_value.is_some() {
            query = query.bind(external_ref_value);
        }

        Ok(query.fetch_optional(executor).await?)
    }

    /// Partial refund, which additionally writes both split amounts (P10).
    pub async fn try_partial_refund<'e>(
        executor: impl PgExecutor<'e>,
        escrow_id: Uuid,
        expected_state: EscrowState,
        expected_version: i64,
        refund_amount_cents: i64,
        release_amount_cents: i64,
        external_refund_id: &str,
    ) -> HustleXpResult<Option<Escrow>> {
        let row = sqlx::query_as::<_, Escrow>(
            "UPDATE escrows
             SET state = 'refund_partial',
                 refunded_at = NOW(),
                 refund_amount_cents = $4,
                 release_amount_cents = $5,
                 external_refund_id = $6
             WHERE id = $1 AND state = $2 AND version = $3
             RETURNING *",
        )
        .bind(escrow_id)
        .bind(expected_state)
        .bind(expected_version)
        .bind(refund_amount_cents)
        .bind(release_amount_cents)
        .bind(external_refund_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }
}
