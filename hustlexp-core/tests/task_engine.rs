//! Task Engine (spec §4.4): lifecycle transitions, the single-accept race
//! (P6), proof-gated completion (HX301), and the progress axis's freezes.

mod common;

use common::{insert_task, posted_task, verified_user, NewTask};
use hustlexp_core::config::CoreConfig;
use hustlexp_core::engine::gates::NoopInstantModeGates;
use hustlexp_core::engine::{EscrowEngine, TaskEngine, TrustEngine};
use hustlexp_core::error::ErrorCode;
use hustlexp_core::models::{ProgressActor, TaskMode, TaskProgressState, TaskRiskTier};
use hustlexp_core::storage::repositories::{ProofRepository, TaskRepository};
use hustlexp_core::storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;

fn engine(pool: &PgPool) -> TaskEngine {
    let storage = Storage::from_pool(pool.clone());
    let trust = TrustEngine::new(storage.clone());
    TaskEngine::new(storage, trust, Arc::new(NoopInstantModeGates::default()), CoreConfig::default())
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn only_one_of_two_concurrent_accepts_wins(pool: PgPool) {
    let (owner_id, task_id, _escrow_id) = posted_task(&pool, 2000).await;
    let worker_a = verified_user(&pool).await;
    let worker_b = verified_user(&pool).await;
    let eng = engine(&pool);
    let _ = owner_id;

    let first = eng.accept(task_id, worker_a).await;
    let second = eng.accept(task_id, worker_b).await;

    assert!(first.is_ok(), "first accept should succeed");
    let second_err = second.unwrap_err();
    assert_eq!(second_err.code, ErrorCode::InvalidState);

    let task = TaskRepository::find(&pool, task_id).await.unwrap();
    assert_eq!(task.worker_id, Some(worker_a));
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn completion_requires_an_accepted_proof(pool: PgPool) {
    let (_owner, task_id, _escrow) = posted_task(&pool, 2000).await;
    let worker_id = verified_user(&pool).await;
    let eng = engine(&pool);

    eng.accept(task_id, worker_id).await.unwrap();
    let proofless = eng.complete(task_id, None).await.unwrap_err();
    assert_eq!(proofless.code, ErrorCode::InvalidState);

    let updated = eng.submit_proof(task_id, worker_id, Some("done"), None).await.unwrap();
    assert_eq!(updated.lifecycle_state, hustlexp_core::models::TaskLifecycleState::ProofSubmitted);

    let proof = ProofRepository::find_pending_for_task(&pool, task_id).await.unwrap();
    let completed = eng.complete(task_id, Some(proof.id)).await.expect("complete with accepted proof");
    assert_eq!(completed.lifecycle_state, hustlexp_core::models::TaskLifecycleState::Completed);
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn terminal_task_rejects_further_transitions(pool: PgPool) {
    let (_owner, task_id, _escrow) = posted_task(&pool, 2000).await;
    let eng = engine(&pool);

    eng.cancel(task_id).await.expect("cancel an open task");

    // HX001: the kernel's terminal guard fires even if a caller somehow
    // bypasses validate_transition (simulated here via a raw UPDATE).
    let result = sqlx::query("UPDATE tasks SET lifecycle_state = 'open' WHERE id = $1")
        .bind(task_id)
        .execute(&pool)
        .await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("HX001"), "expected HX001, got {err}");
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn advance_progress_is_idempotent_on_same_state(pool: PgPool) {
    let (_owner, task_id, _escrow) = posted_task(&pool, 2000).await;
    let worker_id = verified_user(&pool).await;
    let eng = engine(&pool);
    eng.accept(task_id, worker_id).await.unwrap();

    let first = eng
        .advance_progress(task_id, TaskProgressState::Traveling, ProgressActor::Worker)
        .await
        .expect("advance to traveling");
    let again = eng
        .advance_progress(task_id, TaskProgressState::Traveling, ProgressActor::Worker)
        .await
        .expect("idempotent no-op");
    assert_eq!(first.version, again.version, "no-op must not bump version");
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn advance_progress_enforces_actor_authority(pool: PgPool) {
    let (_owner, task_id, _escrow) = posted_task(&pool, 2000).await;
    let worker_id = verified_user(&pool).await;
    let eng = engine(&pool);
    eng.accept(task_id, worker_id).await.unwrap();

    // CLOSED is a system-only transition; a worker-driven call is forbidden.
    let err = eng
        .advance_progress(task_id, TaskProgressState::Traveling, ProgressActor::System)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn advance_progress_freezes_once_escrow_is_terminal(pool: PgPool) {
    let (_owner, task_id, escrow_id) = posted_task(&pool, 2000).await;
    let worker_id = verified_user(&pool).await;
    let eng = engine(&pool);
    eng.accept(task_id, worker_id).await.unwrap();

    let escrow_engine = EscrowEngine::new(Storage::from_pool(pool.clone()));
    escrow_engine.fund(escrow_id, "pi_1").await.unwrap();
    eng.submit_proof(task_id, worker_id, Some("done"), None).await.unwrap();
    let proof = ProofRepository::find_pending_for_task(&pool, task_id).await.unwrap();
    eng.complete(task_id, Some(proof.id)).await.unwrap();
    escrow_engine.release(escrow_id).await.expect("release after completion");

    let err = eng
        .advance_progress(task_id, TaskProgressState::Traveling, ProgressActor::Worker)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn instant_mode_requires_minimum_trust_tier(pool: PgPool) {
    let owner_id = verified_user(&pool).await;
    let task_id = insert_task(
        &pool,
        NewTask {
            owner_id,
            price_cents: 2000,
            requires_proof: true,
            risk_tier: TaskRiskTier::Tier0,
            mode: TaskMode::Standard,
            instant_mode: true,
            sensitive: false,
        },
    )
    .await;

    let rookie = common::insert_user(&pool, common::NewUser::default()).await;
    let eng = engine(&pool);

    let err = eng.accept(task_id, rookie).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InstantTaskTrustInsufficient);

    let verified_worker = verified_user(&pool).await;
    eng.accept(task_id, verified_worker).await.expect("verified tier clears the instant-mode floor");
}
