use crate::error::HustleXpResult;
use crate::outbox::queue::QueuePublisher;
use crate::storage::pool::Storage;
use sqlx::Row;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Claims and dispatches undispatched outbox rows to their target queue
/// (spec §4.2). At-least-once delivery, exactly-once effect: the downstream
/// worker is responsible for idempotent application keyed on
/// `idempotency_key` (P8); this dispatcher's job is only to get the row out
/// of the database and mark it dispatched.
pub struct OutboxDispatcher {
    storage: Storage,
    publisher: std::sync::Arc<dyn QueuePublisher>,
    worker_id: String,
}

impl OutboxDispatcher {
    pub fn new(storage: Storage, publisher: std::sync::Arc<dyn QueuePublisher>) -> Self {
        Self {
            storage,
            publisher,
            worker_id: format!("dispatcher-{}", Uuid::new_v4()),
        }
    }

    /// Claim up to `batch_size` undispatched rows and enqueue each. Returns
    /// the number successfully dispatched.
    pub async fn dispatch_once(&self, batch_size: i64) -> HustleXpResult<usize> {
        let rows = sqlx::query(
            "UPDATE outbox
             SET claimed_at = NOW(), claimed_by = $1
             WHERE id IN (
                 SELECT id FROM outbox
                  WHERE claimed_at IS NULL
                  ORDER BY created_at ASC
                  LIMIT $2
                  FOR UPDATE SKIP LOCKED
             )
             RETURNING id, event_type, aggregate_id, idempotency_key, payload, queue",
        )
        .bind(&self.worker_id)
        .bind(batch_size)
        .fetch_all(self.storage.pool())
        .await?;

        let mut dispatched = 0usize;
        for row in rows {
            let id: Uuid = row.try_get("id")?;
            let idempotency_key: String = row.try_get("idempotency_key")?;
            let payload: serde_json::Value = row.try_get("payload")?;
            let queue: String = row.try_get("queue")?;

            match self.publisher.publish(&queue, &idempotency_key, payload).await {
                Ok(()) => {
                    sqlx::query(
                        "UPDATE outbox SET dispatched_at = NOW(), attempts = attempts + 1 WHERE id = $1",
                    )
                    .bind(id)
                    .execute(self.storage.pool())
                    .await?;
                    dispatched += 1;
                }
                Err(err) => {
                    warn!(event_id = %id, error = %err, "outbox dispatch failed, releasing claim");
                    sqlx::query(
                        "UPDATE outbox
                         SET claimed_at = NULL, claimed_by = NULL,
                             attempts = attempts + 1, last_error = $2
                         WHERE id = $1",
                    )
                    .bind(id)
                    .bind(err.to_string())
                    .execute(self.storage.pool())
                    .await?;
                }
            }
        }

        if dispatched > 0 {
            info!(dispatched, "outbox batch dispatched");
        }
        Ok(dispatched)
    }

    /// Run forever, polling every `interval`. Intended for the worker binary.
    pub async fn run(&self, batch_size: i64, interval: std::time::Duration) -> ! {
        loop {
            if let Err(err) = self.dispatch_once(batch_size).await {
                error!(error = %err, "outbox dispatch cycle failed");
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Stuck-job recovery (§4.2): rows left `claimed` (or a payment event left
/// `processing`) past the timeout are reopened. Timeout default 10 minutes;
/// only numeric timeout parameters are accepted, matching the spec's
/// "only numeric timeout parameters are accepted" constraint.
pub async fn recover_stuck_outbox_rows(storage: &Storage, timeout_secs: i64) -> HustleXpResult<u64> {
    if timeout_secs <= 0 {
        return Err(crate::error::HustleXpError::internal(
            "stuck_job_timeout_secs must be a positive integer",
        ));
    }

    let result = sqlx::query(
        "UPDATE outbox
         SET claimed_at = NULL, claimed_by = NULL
         WHERE dispatched_at IS NULL
           AND claimed_at IS NOT NULL
           AND claimed_at < NOW() - ($1 || ' seconds')::interval",
    )
    .bind(timeout_secs.to_string())
    .execute(storage.pool())
    .await?;

    let recovered = result.rows_affected();
    if recovered > 0 {
        warn!(recovered, "recovered stuck outbox rows");
    }
    Ok(recovered)
}
