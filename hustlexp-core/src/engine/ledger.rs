//! XP & Tax Ledger (spec §3, §4.8). `award_xp` is the only path that credits
//! XP; it runs under SERIALIZABLE isolation so a user's streak/tier snapshot
//! can't shift out from under the computation between read and insert.

use crate::engine::payment_processor::PaymentProcessorClient;
use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{RevenueLedgerEntryType, TaskMode, XpLedgerEntry, XpTaxLedgerEntry};
use crate::storage::repositories::{LedgerRepository, TaskRepository, UserRepository};
use crate::storage::Storage;
use std::sync::Arc;
use uuid::Uuid;

/// Offline-payment tax rate applied by `record_offline_payment` (spec §3).
const XP_TAX_RATE: f64 = 0.10;

#[derive(Clone)]
pub struct LedgerEngine {
    storage: Storage,
    processor: Arc<dyn PaymentProcessorClient>,
}

impl LedgerEngine {
    pub fn new(storage: Storage, processor: Arc<dyn PaymentProcessorClient>) -> Self {
        Self { storage, processor }
    }

    /// `awardXP({userId, taskId, escrowId, baseXP})` (spec §4.8). Computes
    /// `effective_xp = floor(base * streak_multiplier * trust_multiplier *
    /// mode_multiplier)` where `streak_multiplier = min(2.0, 1.0 + 0.05 *
    /// streak_days)`, then inserts the ledger row and credits the user's
    /// running total in the same transaction. Idempotent on
    /// `(user_id, task_id, escrow_id)` — a second award for the same triple
    /// is a no-op that returns the existing state rather than double-crediting.
    pub async fn award_xp(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        escrow_id: Uuid,
        base_xp: i64,
    ) -> HustleXpResult<Option<XpLedgerEntry>> {
        self.storage
            .with_serializable_transaction(|mut tx| async move {
                if LedgerRepository::already_awarded(&mut *tx, user_id, task_id, escrow_id).await? {
                    return Ok((tx, None));
                }

                let user = UserRepository::find_for_update(&mut tx, user_id).await?;
                let task = TaskRepository::find(&mut *tx, task_id).await?;

                let streak_multiplier = (1.0 + 0.05 * user.current_streak_days as f64).min(2.0);
                let trust_multiplier = user.trust_tier.xp_multiplier();
                let mode_multiplier = match task.mode {
                    TaskMode::Live => TaskMode::Live.xp_multiplier(),
                    TaskMode::Standard => TaskMode::Standard.xp_multiplier(),
                };

                let effective_xp =
                    (base_xp as f64 * streak_multiplier * trust_multiplier * mode_multiplier).floor() as i64;

                let xp_before = user.xp_total;
                let xp_after = xp_before + effective_xp;

                let entry = LedgerRepository::insert_xp_award(
                    &mut tx,
                    user_id,
                    task_id,
                    escrow_id,
                    base_xp,
                    effective_xp,
                    xp_before,
                    xp_after,
                    user.current_streak_days,
                    "task_completion",
                )
                .await?;

                UserRepository::add_xp(&mut *tx, user_id, effective_xp).await?;

                Ok((tx, Some(entry)))
            })
            .await
    }

    /// `recordOfflinePayment({userId, taskId, grossAmountCents, baseXP})`
    /// (spec §3, §4.8). The held-back tax must be settled via `pay_tax`
    /// before the user's next XP award can post (kernel's tax variant of
    /// HX201). `base_xp` is run through the same effective-XP formula as
    /// `award_xp` and stashed on the ledger row so `pay_tax` knows exactly
    /// how much to release — the XP was already earned for this task, it's
    /// merely held pending tax settlement.
    pub async fn record_offline_payment(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        gross_amount_cents: i64,
        base_xp: i64,
    ) -> HustleXpResult<XpTaxLedgerEntry> {
        if gross_amount_cents <= 0 {
            return Err(HustleXpError::invalid_state("gross_amount_cents must be positive"));
        }

        let tax_amount_cents = (gross_amount_cents as f64 * XP_TAX_RATE).round() as i64;

        self.storage
            .with_transaction(|mut tx| async move {
                let user = UserRepository::find(&mut *tx, user_id).await?;
                let task = TaskRepository::find(&mut *tx, task_id).await?;

                let streak_multiplier = (1.0 + 0.05 * user.current_streak_days as f64).min(2.0);
                let trust_multiplier = user.trust_tier.xp_multiplier();
                let mode_multiplier = task.mode.xp_multiplier();
                let held_xp_amount = (base_xp as f64 * streak_multiplier * trust_multiplier * mode_multiplier).floor() as i64;

                let entry = LedgerRepository::record_offline_payment_tax(
                    &mut tx,
                    user_id,
                    task_id,
                    gross_amount_cents,
                    tax_amount_cents,
                    held_xp_amount,
                )
                .await?;
                Ok((tx, entry))
            })
            .await
    }

    /// `payTax(userId, paymentIntentId)` (spec §4.8). Verifies with the
    /// external processor that the intent succeeded and is tagged
    /// `type=xp_tax` before settling anything, then settles unpaid tax
    /// entries FIFO up to the verified amount, releasing each entry's
    /// held-back XP directly to the user's running total rather than
    /// re-running `award_xp`.
    pub async fn pay_tax(&self, user_id: Uuid, payment_intent_id: &str) -> HustleXpResult<Vec<Uuid>> {
        let status = self.processor.verify_payment_intent(payment_intent_id).await?;

        if !status.succeeded {
            return Err(HustleXpError::invalid_state("payment intent did not succeed"));
        }
        if status.kind.as_deref() != Some("xp_tax") {
            return Err(HustleXpError::invalid_state("payment intent is not tagged type=xp_tax"));
        }
        let amount_paid_cents = status.amount_cents;
        if amount_paid_cents <= 0 {
            return Err(HustleXpError::invalid_state("amount_paid_cents must be positive"));
        }

        self.storage
            .with_transaction(|mut tx| async move {
                let unpaid = LedgerRepository::unpaid_tax_entries_fifo(&mut tx, user_id).await?;
                let mut remaining = amount_paid_cents;
                let mut settled = Vec::new();

                for entry in unpaid {
                    if remaining < entry.tax_amount_cents {
                        break;
                    }
                    LedgerRepository::mark_tax_entry_paid(&mut tx, entry.id).await?;
                    LedgerRepository::reduce_unpaid_tax(&mut tx, user_id, entry.tax_amount_cents).await?;
                    LedgerRepository::insert_revenue_entry(
                        &mut *tx,
                        Some(entry.task_id),
                        None,
                        RevenueLedgerEntryType::PlatformFee,
                        entry.tax_amount_cents,
                    )
                    .await?;
                    if entry.held_xp_amount > 0 {
                        UserRepository::add_xp(&mut *tx, user_id, entry.held_xp_amount).await?;
                    }
                    remaining -= entry.tax_amount_cents;
                    settled.push(entry.id);
                }

                Ok((tx, settled))
            })
            .await
    }
}
