use crate::error::HustleXpResult;
use crate::models::{Badge, RevenueLedgerEntryType, UserXpTaxStatus, XpLedgerEntry, XpTaxLedgerEntry};
use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

/// Write paths for the append-only ledgers in spec §3/§4.8. INSERT only —
/// UPDATE/DELETE/TRUNCATE are rejected by the kernel triggers (HX102,
/// HX401, HX701/HX702, HX811), not by omission here.
pub struct LedgerRepository;

impl LedgerRepository {
    /// Runs inside `Storage::with_serializable_transaction` per §4.8. The
    /// kernel trigger re-validates HX101 (escrow RELEASED) and the tax
    /// variant of HX201 regardless of what this call already checked.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_xp_award(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        task_id: Uuid,
        escrow_id: Uuid,
        base_xp: i64,
        effective_xp: i64,
        xp_before: i64,
        xp_after: i64,
        streak_days_at_award: i32,
        reason: &str,
    ) -> HustleXpResult<XpLedgerEntry> {
        let row = sqlx::query_as::<_, XpLedgerEntry>(
            "INSERT INTO xp_ledger
                (user_id, task_id, escrow_id, base_xp, effective_xp, xp_before, xp_after,
                 streak_days_at_award, reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(user_id)
        .bind(task_id)
        .bind(escrow_id)
        .bind(base_xp)
        .bind(effective_xp)
        .bind(xp_before)
        .bind(xp_after)
        .bind(streak_days_at_award)
        .bind(reason)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    pub async fn already_awarded<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        task_id: Uuid,
        escrow_id: Uuid,
    ) -> HustleXpResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM xp_ledger WHERE user_id = $1 AND task_id = $2 AND escrow_id = $3)",
        )
        .bind(user_id)
        .bind(task_id)
        .bind(escrow_id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    pub async fn insert_badge<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        badge_key: &str,
    ) -> HustleXpResult<Badge> {
        let row = sqlx::query_as::<_, Badge>(
            "INSERT INTO badges (user_id, badge_key) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(badge_key)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    /// `recordOfflinePayment` (§4.8): appends a tax entry and increments the
    /// per-user aggregate unpaid total in the same transaction.
    pub async fn record_offline_payment_tax(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        task_id: Uuid,
        gross_amount_cents: i64,
        tax_amount_cents: i64,
        held_xp_amount: i64,
    ) -> HustleXpResult<XpTaxLedgerEntry> {
        let row = sqlx::query_as::<_, XpTaxLedgerEntry>(
            "INSERT INTO xp_tax_ledger (user_id, task_id, gross_amount_cents, tax_amount_cents, held_xp_amount)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(user_id)
        .bind(task_id)
        .bind(gross_amount_cents)
        .bind(tax_amount_cents)
        .bind(held_xp_amount)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO user_xp_tax_status (user_id, total_unpaid_tax_cents)
             VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE
                SET total_unpaid_tax_cents = user_xp_tax_status.total_unpaid_tax_cents + EXCLUDED.total_unpaid_tax_cents,
                    updated_at = NOW()",
        )
        .bind(user_id)
        .bind(tax_amount_cents)
        .execute(&mut **tx)
        .await?;

        Ok(row)
    }

    pub async fn tax_status<'e>(executor: impl PgExecutor<'e>, user_id: Uuid) -> HustleXpResult<Option<UserXpTaxStatus>> {
        let row = sqlx::query_as::<_, UserXpTaxStatus>(
            "SELECT * FROM user_xp_tax_status WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn unpaid_tax_entries_fifo(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> HustleXpResult<Vec<XpTaxLedgerEntry>> {
        let rows = sqlx::query_as::<_, XpTaxLedgerEntry>(
            "SELECT * FROM xp_tax_ledger
             WHERE user_id = $1 AND NOT tax_paid
             ORDER BY created_at ASC
             FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    pub async fn mark_tax_entry_paid(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> HustleXpResult<()> {
        sqlx::query("UPDATE xp_tax_ledger SET tax_paid = TRUE, paid_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn reduce_unpaid_tax(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount_cents: i64,
    ) -> HustleXpResult<()> {
        sqlx::query(
            "UPDATE user_xp_tax_status
             SET total_unpaid_tax_cents = GREATEST(total_unpaid_tax_cents - $2, 0), updated_at = NOW()
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(amount_cents)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn insert_revenue_entry<'e>(
        executor: impl PgExecutor<'e>,
        task_id: Option<Uuid>,
        escrow_id: Option<Uuid>,
        entry_type: RevenueLedgerEntryType,
        amount_cents: i64,
    ) -> HustleXpResult<()> {
        sqlx::query(
            "INSERT INTO revenue_ledger (task_id, escrow_id, entry_type, amount_cents)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(task_id)
        .bind(escrow_id)
        .bind(entry_type)
        .bind(amount_cents)
        .execute(executor)
        .await?;
        Ok(())
    }
}
