//! Payment Ingestion (spec §4.5): scenario 2 (duplicate event dedup),
//! scenario 4 (dispute gate — a `transfer.created` never releases a
//! LOCKED_DISPUTE escrow), and the terminal-skip / unknown-type paths that
//! must finalize as `skipped`, not `failed`.

mod common;

use common::{force_complete, posted_task};
use hustlexp_core::engine::dispute::CreateDisputeParams;
use hustlexp_core::engine::{DisputeEngine, EscrowEngine, PaymentIngestionWorker};
use hustlexp_core::error::ErrorCode;
use hustlexp_core::models::{EscrowState, PaymentEventResult};
use hustlexp_core::storage::repositories::{EscrowRepository, PaymentEventRepository};
use hustlexp_core::storage::Storage;
use serde_json::json;
use sqlx::PgPool;

fn transfer_payload(escrow_id: uuid::Uuid, transfer_id: &str) -> serde_json::Value {
    json!({ "id": transfer_id, "metadata": { "escrow_id": escrow_id.to_string() } })
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn funded_escrow_transfer_created_releases_and_closes_progress(pool: PgPool) {
    let (_owner, task_id, escrow_id) = posted_task(&pool, 2500).await;
    let worker_id = common::verified_user(&pool).await;
    sqlx::query("UPDATE tasks SET worker_id = $2, progress_state = 'completed' WHERE id = $1")
        .bind(task_id)
        .bind(worker_id)
        .execute(&pool)
        .await
        .unwrap();

    let storage = Storage::from_pool(pool.clone());
    EscrowEngine::new(storage.clone()).fund(escrow_id, "pi_1").await.unwrap();
    force_complete(&pool, task_id, worker_id).await;

    let worker = PaymentIngestionWorker::new(storage.clone());
    worker
        .ingest("evt_transfer_1", "transfer.created", transfer_payload(escrow_id, "tr_1"))
        .await
        .expect("first delivery processes");

    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.state, EscrowState::Released);

    let event = PaymentEventRepository::find(&pool, "evt_transfer_1").await.unwrap();
    assert_eq!(event.result, Some(PaymentEventResult::Success));

    let task = sqlx::query_as::<_, hustlexp_core::models::Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(task_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(task.progress_state, hustlexp_core::models::TaskProgressState::Closed);
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn duplicate_external_id_is_rejected_and_replay_is_a_silent_noop(pool: PgPool) {
    // Scenario 2: inserting the same external id twice fails unique-PK...
    let (owner, task_id, escrow_id) = posted_task(&pool, 2500).await;
    let storage = Storage::from_pool(pool.clone());
    EscrowEngine::new(storage.clone()).fund(escrow_id, "pi_1").await.unwrap();
    sqlx::query("UPDATE tasks SET progress_state = 'completed' WHERE id = $1")
        .bind(task_id)
        .execute(&pool)
        .await
        .unwrap();
    force_complete(&pool, task_id, owner).await;

    let worker = PaymentIngestionWorker::new(storage.clone());
    worker
        .ingest("evt_transfer_dup", "transfer.created", transfer_payload(escrow_id, "tr_1"))
        .await
        .unwrap();

    let err = PaymentEventRepository::ingest(
        &pool,
        "evt_transfer_dup",
        "transfer.created",
        transfer_payload(escrow_id, "tr_1"),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Duplicate);

    // ...and if the first job is retried with the same external id (no new
    // insert, just a re-dispatch of the existing row), the claim query finds
    // it already claimed/processed and `process` returns silently without
    // touching escrow state again.
    worker.process("evt_transfer_dup").await.expect("duplicate job is a silent no-op");

    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.state, EscrowState::Released, "escrow state unchanged by the replayed job");
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn transfer_created_never_releases_a_locked_dispute_escrow(pool: PgPool) {
    // Spec scenario 4 / P9: ingestion must not release an escrow that's
    // under an open dispute; it marks the event skipped rather than
    // silently releasing or hard-failing.
    let (poster_id, task_id, escrow_id) = posted_task(&pool, 2500).await;
    let worker_id = common::verified_user(&pool).await;
    let storage = Storage::from_pool(pool.clone());

    EscrowEngine::new(storage.clone()).fund(escrow_id, "pi_1").await.unwrap();
    sqlx::query("UPDATE tasks SET worker_id = $2, progress_state = 'completed' WHERE id = $1")
        .bind(task_id)
        .bind(worker_id)
        .execute(&pool)
        .await
        .unwrap();
    force_complete(&pool, task_id, worker_id).await;

    DisputeEngine::new(storage.clone())
        .create(CreateDisputeParams {
            task_id,
            escrow_id,
            initiated_by: poster_id,
            poster_id,
            worker_id,
            reason: "dispute before payout".to_string(),
        })
        .await
        .unwrap();

    let worker = PaymentIngestionWorker::new(storage.clone());
    worker
        .ingest("evt_transfer_locked", "transfer.created", transfer_payload(escrow_id, "tr_locked"))
        .await
        .expect("skip is not an error");

    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.state, EscrowState::LockedDispute, "P9: release happens only through dispute resolution");

    let event = PaymentEventRepository::find(&pool, "evt_transfer_locked").await.unwrap();
    assert_eq!(event.result, Some(PaymentEventResult::Skipped));
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn charge_refunded_is_allowed_through_even_while_locked_for_dispute(pool: PgPool) {
    // Unlike `transfer.created`, spec §4.5 explicitly allows `charge.refunded`
    // to transition PENDING|FUNDED|LOCKED_DISPUTE -> REFUNDED.
    let (poster_id, task_id, escrow_id) = posted_task(&pool, 2500).await;
    let worker_id = common::verified_user(&pool).await;
    let storage = Storage::from_pool(pool.clone());

    EscrowEngine::new(storage.clone()).fund(escrow_id, "pi_1").await.unwrap();
    sqlx::query("UPDATE tasks SET worker_id = $2, progress_state = 'completed' WHERE id = $1")
        .bind(task_id)
        .bind(worker_id)
        .execute(&pool)
        .await
        .unwrap();
    force_complete(&pool, task_id, worker_id).await;

    DisputeEngine::new(storage.clone())
        .create(CreateDisputeParams {
            task_id,
            escrow_id,
            initiated_by: poster_id,
            poster_id,
            worker_id,
            reason: "refund expected".to_string(),
        })
        .await
        .unwrap();

    let worker = PaymentIngestionWorker::new(storage.clone());
    worker
        .ingest("evt_refund_locked", "charge.refunded", transfer_payload(escrow_id, "re_locked"))
        .await
        .expect("refund from LOCKED_DISPUTE is allowed");

    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.state, EscrowState::Refunded);

    let event = PaymentEventRepository::find(&pool, "evt_refund_locked").await.unwrap();
    assert_eq!(event.result, Some(PaymentEventResult::Success));
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn already_terminal_escrow_is_skipped_not_failed(pool: PgPool) {
    let (owner, task_id, escrow_id) = posted_task(&pool, 2500).await;
    let storage = Storage::from_pool(pool.clone());
    EscrowEngine::new(storage.clone()).fund(escrow_id, "pi_1").await.unwrap();
    force_complete(&pool, task_id, owner).await;
    EscrowEngine::new(storage.clone()).release(escrow_id).await.unwrap();

    let worker = PaymentIngestionWorker::new(storage.clone());
    worker
        .ingest("evt_replay_after_release", "transfer.created", transfer_payload(escrow_id, "tr_again"))
        .await
        .expect("skip, not an error");

    let event = PaymentEventRepository::find(&pool, "evt_replay_after_release").await.unwrap();
    assert_eq!(event.result, Some(PaymentEventResult::Skipped));
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn unknown_event_type_is_skipped(pool: PgPool) {
    let (_owner, _task_id, escrow_id) = posted_task(&pool, 2500).await;
    let storage = Storage::from_pool(pool.clone());
    let worker = PaymentIngestionWorker::new(storage);

    worker
        .ingest("evt_unknown", "dispute.created", transfer_payload(escrow_id, "whatever"))
        .await
        .expect("unrecognized types are skipped, not errors");

    let event = PaymentEventRepository::find(&pool, "evt_unknown").await.unwrap();
    assert_eq!(event.result, Some(PaymentEventResult::Skipped));
}
