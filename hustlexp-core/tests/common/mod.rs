//! Shared fixtures for the integration suite. Each `#[sqlx::test]` gets its
//! own freshly migrated database, so these just cut down on per-test
//! boilerplate for inserting the rows the engines expect to find.

use hustlexp_core::models::{TaskMode, TaskRiskTier, TrustTier, UserPlan};
use sqlx::PgPool;
use uuid::Uuid;

pub struct NewUser {
    pub trust_tier: TrustTier,
    pub plan: UserPlan,
    pub phone_verified: bool,
    pub payment_method_verified: bool,
    pub id_verified: bool,
    pub payouts_locked: bool,
    pub trust_hold: bool,
}

impl Default for NewUser {
    fn default() -> Self {
        Self {
            trust_tier: TrustTier::Rookie,
            plan: UserPlan::Free,
            phone_verified: false,
            payment_method_verified: false,
            id_verified: false,
            payouts_locked: false,
            trust_hold: false,
        }
    }
}

pub async fn insert_user(pool: &PgPool, opts: NewUser) -> Uuid {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO users
            (email, trust_tier, plan, phone_verified, payment_method_verified, id_verified,
             payouts_locked, trust_hold)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id",
    )
    .bind(format!("{}@example.test", Uuid::new_v4()))
    .bind(opts.trust_tier)
    .bind(opts.plan)
    .bind(opts.phone_verified)
    .bind(opts.payment_method_verified)
    .bind(opts.id_verified)
    .bind(opts.payouts_locked)
    .bind(opts.trust_hold)
    .fetch_one(pool)
    .await
    .expect("insert fixture user");
    id
}

pub async fn verified_user(pool: &PgPool) -> Uuid {
    insert_user(
        pool,
        NewUser {
            trust_tier: TrustTier::Verified,
            phone_verified: true,
            payment_method_verified: true,
            id_verified: true,
            ..Default::default()
        },
    )
    .await
}

pub struct NewTask {
    pub owner_id: Uuid,
    pub price_cents: i64,
    pub requires_proof: bool,
    pub risk_tier: TaskRiskTier,
    pub mode: TaskMode,
    pub instant_mode: bool,
    pub sensitive: bool,
}

pub async fn insert_task(pool: &PgPool, t: NewTask) -> Uuid {
    let initial_state = if t.instant_mode { "matching" } else { "open" };
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO tasks
            (owner_id, title, price_cents, requires_proof, risk_tier, mode, instant_mode,
             sensitive, lifecycle_state)
         VALUES ($1, 'Mow the lawn', $2, $3, $4, $5, $6, $7, $8)
         RETURNING id",
    )
    .bind(t.owner_id)
    .bind(t.price_cents)
    .bind(t.requires_proof)
    .bind(t.risk_tier)
    .bind(t.mode)
    .bind(t.instant_mode)
    .bind(t.sensitive)
    .bind(initial_state)
    .fetch_one(pool)
    .await
    .expect("insert fixture task");
    id
}

pub async fn insert_escrow(pool: &PgPool, task_id: Uuid, amount_cents: i64) -> Uuid {
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO escrows (task_id, amount_cents, state) VALUES ($1, $2, 'pending') RETURNING id",
    )
    .bind(task_id)
    .bind(amount_cents)
    .fetch_one(pool)
    .await
    .expect("insert fixture escrow");
    id
}

/// Convenience: a STANDARD-mode, non-instant, TIER_0 task owned by a fresh
/// VERIFIED poster, with its PENDING escrow, ready to be accepted.
pub async fn posted_task(pool: &PgPool, price_cents: i64) -> (Uuid, Uuid, Uuid) {
    let owner_id = verified_user(pool).await;
    let task_id = insert_task(
        pool,
        NewTask {
            owner_id,
            price_cents,
            requires_proof: true,
            risk_tier: TaskRiskTier::Tier0,
            mode: TaskMode::Standard,
            instant_mode: false,
            sensitive: false,
        },
    )
    .await;
    let escrow_id = insert_escrow(pool, task_id, price_cents).await;
    (owner_id, task_id, escrow_id)
}

/// Jumps a task straight to COMPLETED via a raw UPDATE (bypassing
/// `TaskEngine::complete`) for tests that only care about what happens
/// downstream of completion (escrow release, payment ingestion, disputes).
/// Since `posted_task` tasks require proof, this inserts a matching
/// ACCEPTED proof first so the kernel's HX301 guard doesn't reject the
/// shortcut.
pub async fn force_complete(pool: &PgPool, task_id: Uuid, submitter_id: Uuid) {
    sqlx::query(
        "INSERT INTO proofs (task_id, submitter_id, state) VALUES ($1, $2, 'accepted')",
    )
    .bind(task_id)
    .bind(submitter_id)
    .execute(pool)
    .await
    .expect("insert fixture accepted proof");

    sqlx::query("UPDATE tasks SET lifecycle_state = 'completed', completed_at = NOW() WHERE id = $1")
        .bind(task_id)
        .execute(pool)
        .await
        .expect("force task to completed");
}
