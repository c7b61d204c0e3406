//! Ledger Engine (spec §4.8): `pay_tax` only settles against a processor
//! confirmation, never a caller-asserted amount.

mod common;

use async_trait::async_trait;
use common::verified_user;
use hustlexp_core::engine::{LedgerEngine, PaymentIntentStatus, PaymentProcessorClient};
use hustlexp_core::error::{ErrorCode, HustleXpResult};
use hustlexp_core::storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

struct FakeProcessor {
    succeeded: bool,
    kind: Option<String>,
    amount_cents: i64,
}

#[async_trait]
impl PaymentProcessorClient for FakeProcessor {
    async fn create_payment_intent(&self, _amount_cents: i64, _escrow_id: Uuid) -> HustleXpResult<String> {
        unimplemented!("not exercised by pay_tax")
    }

    async fn create_transfer(&self, _amount_cents: i64, _escrow_id: Uuid) -> HustleXpResult<String> {
        unimplemented!("not exercised by pay_tax")
    }

    async fn create_refund(&self, _payment_intent_id: &str, _amount_cents: i64, _escrow_id: Uuid) -> HustleXpResult<String> {
        unimplemented!("not exercised by pay_tax")
    }

    async fn verify_payment_intent(&self, payment_intent_id: &str) -> HustleXpResult<PaymentIntentStatus> {
        Ok(PaymentIntentStatus {
            external_id: payment_intent_id.to_string(),
            succeeded: self.succeeded,
            amount_cents: self.amount_cents,
            kind: self.kind.clone(),
        })
    }
}

async fn record_unpaid_tax(pool: &PgPool, user_id: Uuid, task_id: Uuid, gross_cents: i64, tax_cents: i64) -> Uuid {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO xp_tax_ledger (user_id, task_id, gross_amount_cents, tax_amount_cents, held_xp_amount)
         VALUES ($1, $2, $3, $4, 50)
         RETURNING id",
    )
    .bind(user_id)
    .bind(task_id)
    .bind(gross_cents)
    .bind(tax_cents)
    .fetch_one(pool)
    .await
    .expect("insert unpaid tax entry");

    sqlx::query(
        "INSERT INTO user_xp_tax_status (user_id, total_unpaid_tax_cents) VALUES ($1, $2)
         ON CONFLICT (user_id) DO UPDATE SET total_unpaid_tax_cents = user_xp_tax_status.total_unpaid_tax_cents + EXCLUDED.total_unpaid_tax_cents",
    )
    .bind(user_id)
    .bind(tax_cents)
    .execute(pool)
    .await
    .expect("seed tax status");

    id
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn pay_tax_requires_a_succeeded_xp_tax_intent(pool: PgPool) {
    let user_id = verified_user(&pool).await;
    let task_id = common::insert_task(
        &pool,
        common::NewTask {
            owner_id: user_id,
            price_cents: 1000,
            requires_proof: false,
            risk_tier: hustlexp_core::models::TaskRiskTier::Tier0,
            mode: hustlexp_core::models::TaskMode::Standard,
            instant_mode: false,
            sensitive: false,
        },
    )
    .await;
    record_unpaid_tax(&pool, user_id, task_id, 1000, 100).await;

    let storage = Storage::from_pool(pool.clone());

    let unsucceeded = Arc::new(FakeProcessor { succeeded: false, kind: Some("xp_tax".to_string()), amount_cents: 100 });
    let engine = LedgerEngine::new(storage.clone(), unsucceeded);
    let err = engine.pay_tax(user_id, "pi_unsettled").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);

    let wrong_kind = Arc::new(FakeProcessor { succeeded: true, kind: Some("transfer".to_string()), amount_cents: 100 });
    let engine = LedgerEngine::new(storage, wrong_kind);
    let err = engine.pay_tax(user_id, "pi_wrong_kind").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);
}

#[sqlx::test(migrations = "./src/storage/migrations")]
async fn pay_tax_settles_fifo_up_to_verified_amount(pool: PgPool) {
    let user_id = verified_user(&pool).await;
    let task_a = common::insert_task(
        &pool,
        common::NewTask {
            owner_id: user_id,
            price_cents: 1000,
            requires_proof: false,
            risk_tier: hustlexp_core::models::TaskRiskTier::Tier0,
            mode: hustlexp_core::models::TaskMode::Standard,
            instant_mode: false,
            sensitive: false,
        },
    )
    .await;
    let task_b = common::insert_task(
        &pool,
        common::NewTask {
            owner_id: user_id,
            price_cents: 1000,
            requires_proof: false,
            risk_tier: hustlexp_core::models::TaskRiskTier::Tier0,
            mode: hustlexp_core::models::TaskMode::Standard,
            instant_mode: false,
            sensitive: false,
        },
    )
    .await;

    let first = record_unpaid_tax(&pool, user_id, task_a, 1000, 100).await;
    let _second = record_unpaid_tax(&pool, user_id, task_b, 2000, 200).await;

    let storage = Storage::from_pool(pool.clone());
    let processor = Arc::new(FakeProcessor { succeeded: true, kind: Some("xp_tax".to_string()), amount_cents: 150 });
    let engine = LedgerEngine::new(storage, processor);

    // Verified amount (150) covers the first entry's tax (100) but not the
    // second's (200): only the first settles.
    let settled = engine.pay_tax(user_id, "pi_partial").await.unwrap();
    assert_eq!(settled, vec![first]);

    let xp_total: i64 = sqlx::query_scalar("SELECT xp_total FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(xp_total, 50, "held-back xp from the settled entry is released");

    let unpaid: i64 = sqlx::query_scalar("SELECT total_unpaid_tax_cents FROM user_xp_tax_status WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(unpaid, 200, "second entry's tax is still outstanding");
}
