use crate::error::HustleXpResult;
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// `writeToOutbox` (spec §4.2). MUST be called inside the same transaction
/// as the state change it describes — if the caller's transaction rolls
/// back, this row never exists.
#[allow(clippy::too_many_arguments)]
pub async fn write_to_outbox(
    tx: &mut Transaction<'_, Postgres>,
    event_type: &str,
    aggregate_type: &str,
    aggregate_id: Uuid,
    event_version: i32,
    idempotency_key: &str,
    payload: Value,
    queue: &str,
) -> HustleXpResult<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO outbox
            (aggregate_type, aggregate_id, event_type, event_version, idempotency_key, payload, queue)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id",
    )
    .bind(aggregate_type)
    .bind(aggregate_id)
    .bind(event_type)
    .bind(event_version)
    .bind(idempotency_key)
    .bind(payload)
    .bind(queue)
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}
