use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only XP ledger row (spec §3). INSERT only — the kernel forbids
/// UPDATE/DELETE/TRUNCATE (HX102) and requires the referenced escrow to be
/// RELEASED (HX101) and the user's offline tax to be fully paid (HX201/XP
/// tax variant).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct XpLedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub escrow_id: Uuid,
    pub base_xp: i64,
    pub effective_xp: i64,
    pub xp_before: i64,
    pub xp_after: i64,
    pub streak_days_at_award: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Badge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub badge_key: String,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrustLedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub before_tier: crate::models::TrustTier,
    pub after_tier: crate::models::TrustTier,
    pub source: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// One entry per offline-paid task (spec §3, §4.8).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct XpTaxLedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub gross_amount_cents: i64,
    pub tax_amount_cents: i64,
    pub held_xp_amount: i64,
    pub xp_held_back: bool,
    pub tax_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate per-user unpaid-tax tracker; the kernel trigger that gates XP
/// inserts (HX201, tax variant) reads this row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserXpTaxStatus {
    pub user_id: Uuid,
    pub total_unpaid_tax_cents: i64,
    pub updated_at: DateTime<Utc>,
}

/// Append-only platform revenue ledger (HX701/HX702): chargeback-type rows
/// are immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "revenue_ledger_entry_type", rename_all = "snake_case")]
pub enum RevenueLedgerEntryType {
    PlatformFee,
    Chargeback,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RevenueLedgerEntry {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    pub escrow_id: Option<Uuid>,
    pub entry_type: RevenueLedgerEntryType,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Card-network-style dispute/chargeback raised by the external payment
/// processor against a payment intent (distinct from the marketplace
/// `Dispute` entity). Append-only except for `status` (HX811 forbids
/// DELETE).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentDispute {
    pub id: Uuid,
    pub external_payment_intent_id: String,
    pub escrow_id: Option<Uuid>,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
