use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{ExternalPaymentEvent, PaymentEventResult};
use sqlx::PgExecutor;

pub struct PaymentEventRepository;

impl PaymentEventRepository {
    /// Insertion of a duplicate external id fails with a unique violation —
    /// the dedup boundary (spec §4.5). Surfaces as `ErrorCode::Duplicate`.
    pub async fn ingest<'e>(
        executor: impl PgExecutor<'e>,
        external_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> HustleXpResult<ExternalPaymentEvent> {
        let row = sqlx::query_as::<_, ExternalPaymentEvent>(
            "INSERT INTO external_payment_events (external_id, event_type, payload)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(external_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// Atomic claim: `UPDATE ... WHERE claimed_at IS NULL`. `None` means the
    /// job is a duplicate and the worker should return silently.
    pub async fn try_claim<'e>(
        executor: impl PgExecutor<'e>,
        external_id: &str,
    ) -> HustleXpResult<Option<ExternalPaymentEvent>> {
        let row = sqlx::query_as::<_, ExternalPaymentEvent>(
            "UPDATE external_payment_events
             SET claimed_at = NOW(), result = 'processing'
             WHERE external_id = $1 AND claimed_at IS NULL AND processed_at IS NULL
             RETURNING *",
        )
        .bind(external_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn finalize<'e>(
        executor: impl PgExecutor<'e>,
        external_id: &str,
        result: PaymentEventResult,
        error_message: Option<&str>,
    ) -> HustleXpResult<()> {
        sqlx::query(
            "UPDATE external_payment_events
             SET processed_at = NOW(), result = $2, error_message = $3
             WHERE external_id = $1",
        )
        .bind(external_id)
        .bind(result)
        .bind(error_message)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Claims up to `limit` unclaimed rows for the ingestion worker's poll
    /// loop (spec §4.5), mirroring the outbox dispatcher's `SKIP LOCKED`
    /// claim pattern so concurrent worker instances never double-process.
    pub async fn claim_batch<'e>(
        executor: impl PgExecutor<'e>,
        limit: i64,
    ) -> HustleXpResult<Vec<ExternalPaymentEvent>> {
        let rows = sqlx::query_as::<_, ExternalPaymentEvent>(
            "UPDATE external_payment_events
             SET claimed_at = NOW(), result = 'processing'
             WHERE external_id IN (
                 SELECT external_id FROM external_payment_events
                  WHERE claimed_at IS NULL AND processed_at IS NULL
                  ORDER BY created_at ASC
                  LIMIT $1
                  FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Stuck-job recovery counterpart to [`crate::outbox::recover_stuck_outbox_rows`]:
    /// rows left `claimed` past the timeout without completing are reopened.
    pub async fn recover_stuck<'e>(executor: impl PgExecutor<'e>, timeout_secs: i64) -> HustleXpResult<u64> {
        let result = sqlx::query(
            "UPDATE external_payment_events
             SET claimed_at = NULL, result = NULL
             WHERE processed_at IS NULL
               AND claimed_at IS NOT NULL
               AND claimed_at < NOW() - ($1 || ' seconds')::interval",
        )
        .bind(timeout_secs.to_string())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find<'e>(
        executor: impl PgExecutor<'e>,
        external_id: &str,
    ) -> HustleXpResult<ExternalPaymentEvent> {
        sqlx::query_as::<_, ExternalPaymentEvent>(
            "SELECT * FROM external_payment_events WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| HustleXpError::not_found(format!("payment event {external_id} not found")))
    }
}
