//! Escrow Engine (spec §4.3) and storage-kernel invariants it leans on:
//! P1 (immutable money), P2 (release gated on task completion), P5
//! (terminal immutability), P10 (split sums).

mod common;

use common::{force_complete, insert_task, posted_task, NewTask};
use hustlexp_core::engine::EscrowEngine;
use hustlexp_core::error::ErrorCode;
use hustlexp_core::models::{TaskMode, TaskRiskTier};
use hustlexp_core::storage::repositories::{EscrowRepository, TaskRepository};
use hustlexp_core::storage::Storage;
use sqlx::PgPool;

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn fund_then_release_requires_completed_task(pool: PgPool) {
    let (owner, task_id, escrow_id) = posted_task(&pool, 2500).await;
    let storage = Storage::from_pool(pool.clone());
    let engine = EscrowEngine::new(storage);

    let funded = engine.fund(escrow_id, "pi_123").await.expect("fund");
    assert_eq!(funded.amount_cents, 2500, "P1: amount unchanged by fund");

    // HX201: task is still OPEN, so the kernel trigger rejects release.
    let err = engine.release(escrow_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Invariant("HX201".to_string()));

    force_complete(&pool, task_id, owner).await;

    let released = engine.release(escrow_id).await.expect("release after completion");
    assert_eq!(released.state, hustlexp_core::models::EscrowState::Released);
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn amount_is_immutable_after_insert(pool: PgPool) {
    let (_owner, _task_id, escrow_id) = posted_task(&pool, 5000).await;

    // Any UPDATE attempting to change amount_cents is rejected by HX004,
    // even one that also performs a legal state transition.
    let result = sqlx::query(
        "UPDATE escrows SET amount_cents = 6000, state = 'funded' WHERE id = $1",
    )
    .bind(escrow_id)
    .execute(&pool)
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("HX004"), "expected HX004, got {err}");

    let escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(escrow.amount_cents, 5000, "P1: amount still the INSERT value");
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn terminal_escrow_cannot_be_modified(pool: PgPool) {
    let (owner, task_id, escrow_id) = posted_task(&pool, 5000).await;
    let storage = Storage::from_pool(pool.clone());
    let engine = EscrowEngine::new(storage);

    engine.fund(escrow_id, "pi_1").await.unwrap();
    force_complete(&pool, task_id, owner).await;
    engine.release(escrow_id).await.unwrap();

    // P5: RELEASED is terminal; any further transition attempt fails HX002.
    let err = engine.refund(escrow_id, "re_1").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Invariant("HX002".to_string()));
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn partial_refund_requires_sums_to_match_amount(pool: PgPool) {
    let (owner, task_id, escrow_id) = posted_task(&pool, 10000).await;
    let storage = Storage::from_pool(pool.clone());
    let engine = EscrowEngine::new(storage);

    engine.fund(escrow_id, "pi_1").await.unwrap();
    force_complete(&pool, task_id, owner).await;

    // Scenario 5's rejected case: sums don't match amount.
    let err = engine
        .partial_refund(escrow_id, "re_bad", 3000, 8000)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);

    // Scenario 5's accepted case.
    let updated = engine
        .partial_refund(escrow_id, "re_good", 3000, 7000)
        .await
        .expect("valid split");
    assert_eq!(updated.state, hustlexp_core::models::EscrowState::RefundPartial);
    assert_eq!(updated.refund_amount_cents, Some(3000));
    assert_eq!(updated.release_amount_cents, Some(7000));
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn concurrent_fund_attempts_resolve_via_version(pool: PgPool) {
    let (_owner, _task_id, escrow_id) = posted_task(&pool, 1500).await;
    let storage = Storage::from_pool(pool.clone());
    let engine = EscrowEngine::new(storage);

    // Both callers read PENDING at version 0 before either funds.
    let stale = EscrowRepository::find(&pool, escrow_id).await.unwrap();

    engine.fund(escrow_id, "pi_first").await.unwrap();

    // The second caller's conditional UPDATE still targets state = pending,
    // version = 0, which no longer matches: it loses the race and gets None
    // back rather than a second silent fund.
    let lost_race = EscrowRepository::try_transition(
        &pool,
        escrow_id,
        stale.state,
        stale.version,
        hustlexp_core::models::EscrowState::Funded,
        "funded_at",
        Some("external_payment_intent_id"),
        Some("pi_second"),
    )
    .await
    .unwrap();
    assert!(lost_race.is_none());

    let final_escrow = EscrowRepository::find(&pool, escrow_id).await.unwrap();
    assert_eq!(final_escrow.external_payment_intent_id.as_deref(), Some("pi_first"));
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn high_risk_task_minimum_is_enforced_at_creation(pool: PgPool) {
    let owner_id = common::verified_user(&pool).await;

    // LIVE mode under 1500 is rejected by the kernel even via a raw insert
    // attempt bypassing the engine (HX902).
    let result = sqlx::query(
        "INSERT INTO tasks (owner_id, title, price_cents, mode) VALUES ($1, 't', 1000, 'live')",
    )
    .bind(owner_id)
    .execute(&pool)
    .await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("HX902"));

    let task_id = insert_task(
        &pool,
        NewTask {
            owner_id,
            price_cents: 1500,
            requires_proof: false,
            risk_tier: TaskRiskTier::Tier0,
            mode: TaskMode::Live,
            instant_mode: false,
            sensitive: false,
        },
    )
    .await;
    let task = TaskRepository::find(&pool, task_id).await.unwrap();
    assert_eq!(task.mode, TaskMode::Live);
}
