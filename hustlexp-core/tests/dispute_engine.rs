//! Dispute & Resolution (spec §4.7): P9 (release from LOCKED_DISPUTE only
//! through resolution, never a transfer event) and P10 (split sums) at the
//! engine layer, on top of what `escrow_engine.rs` already covers at the
//! kernel layer.

mod common;

use common::{force_complete, posted_task};
use hustlexp_core::engine::dispute::{CreateDisputeParams, ResolutionOutcome};
use hustlexp_core::engine::{DisputeEngine, EscrowEngine};
use hustlexp_core::error::ErrorCode;
use hustlexp_core::models::EscrowState;
use hustlexp_core::storage::repositories::EscrowRepository;
use hustlexp_core::storage::Storage;
use sqlx::PgPool;
use uuid::Uuid;

async fn completed_and_funded(pool: &PgPool, price_cents: i64) -> (Uuid, Uuid, Uuid, Uuid) {
    let (owner_id, task_id, escrow_id) = posted_task(pool, price_cents).await;
    let worker_id = common::verified_user(pool).await;

    let storage = Storage::from_pool(pool.clone());
    EscrowEngine::new(storage).fund(escrow_id, "pi_1").await.unwrap();

    sqlx::query("UPDATE tasks SET worker_id = $2 WHERE id = $1")
        .bind(task_id)
        .bind(worker_id)
        .execute(pool)
        .await
        .unwrap();
    force_complete(pool, task_id, worker_id).await;

    (owner_id, task_id, escrow_id, worker_id)
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn create_locks_escrow_and_resolve_release_unlocks_it(pool: PgPool) {
    let (poster_id, task_id, escrow_id, worker_id) = completed_and_funded(&pool, 2500).await;
    let storage = Storage::from_pool(pool.clone());
    let disputes = DisputeEngine::new(storage);

    let dispute = disputes
        .create(CreateDisputeParams {
            task_id,
            escrow_id,
            initiated_by: poster_id,
            poster_id,
            worker_id,
            reason: "work not completed as described".to_string(),
        })
        .await
        .expect("dispute opens within window");

    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.state, EscrowState::LockedDispute, "creating a dispute locks the escrow");

    let admin_id = common::verified_user(&pool).await;
    sqlx::query("INSERT INTO admin_roles (user_id, can_resolve_disputes) VALUES ($1, TRUE)")
        .bind(admin_id)
        .execute(&pool)
        .await
        .unwrap();

    let resolved = disputes
        .resolve(dispute.id, admin_id, ResolutionOutcome::Release)
        .await
        .expect("admin may resolve");

    assert!(resolved.state.is_terminal());
    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.state, EscrowState::Released, "P9: release happened via resolution");
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn dispute_cannot_open_outside_48_hour_window(pool: PgPool) {
    let (poster_id, task_id, escrow_id, worker_id) = completed_and_funded(&pool, 2500).await;

    sqlx::query("UPDATE tasks SET completed_at = NOW() - INTERVAL '49 hours' WHERE id = $1")
        .bind(task_id)
        .execute(&pool)
        .await
        .unwrap();

    let storage = Storage::from_pool(pool.clone());
    let disputes = DisputeEngine::new(storage);

    let err = disputes
        .create(CreateDisputeParams {
            task_id,
            escrow_id,
            initiated_by: poster_id,
            poster_id,
            worker_id,
            reason: "too late".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);

    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.state, EscrowState::Funded, "escrow untouched when the dispute window already closed");
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn split_resolution_requires_sums_to_match_and_is_terminal(pool: PgPool) {
    let (poster_id, task_id, escrow_id, worker_id) = completed_and_funded(&pool, 10000).await;
    let storage = Storage::from_pool(pool.clone());
    let disputes = DisputeEngine::new(storage);

    let dispute = disputes
        .create(CreateDisputeParams {
            task_id,
            escrow_id,
            initiated_by: worker_id,
            poster_id,
            worker_id,
            reason: "partial delivery".to_string(),
        })
        .await
        .unwrap();

    let admin_id = common::verified_user(&pool).await;
    sqlx::query("INSERT INTO admin_roles (user_id, can_resolve_disputes) VALUES ($1, TRUE)")
        .bind(admin_id)
        .execute(&pool)
        .await
        .unwrap();

    // Scenario 5's rejected case: sums don't match amount.
    let err = disputes
        .resolve(
            dispute.id,
            admin_id,
            ResolutionOutcome::Split { refund_cents: 3000, release_cents: 8000 },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);

    // Scenario 5's accepted case.
    let resolved = disputes
        .resolve(
            dispute.id,
            admin_id,
            ResolutionOutcome::Split { refund_cents: 3000, release_cents: 7000 },
        )
        .await
        .expect("valid split resolves");
    assert!(resolved.state.is_terminal());

    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.state, EscrowState::RefundPartial);
    assert_eq!(escrow.refund_amount_cents, Some(3000));
    assert_eq!(escrow.release_amount_cents, Some(7000));

    // RESOLVED is terminal: a second resolution attempt is rejected.
    let err = disputes.resolve(dispute.id, admin_id, ResolutionOutcome::Release).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn resolve_is_forbidden_without_the_admin_capability(pool: PgPool) {
    let (poster_id, task_id, escrow_id, worker_id) = completed_and_funded(&pool, 2500).await;
    let storage = Storage::from_pool(pool.clone());
    let disputes = DisputeEngine::new(storage);

    let dispute = disputes
        .create(CreateDisputeParams {
            task_id,
            escrow_id,
            initiated_by: poster_id,
            poster_id,
            worker_id,
            reason: "no access".to_string(),
        })
        .await
        .unwrap();

    // Not an admin at all: no admin_roles row for this user.
    let err = disputes.resolve(dispute.id, poster_id, ResolutionOutcome::Release).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
}
