//! Trust & Eligibility Authority (spec §4.6). `assert_eligibility` is the
//! single correct authority for "may this user act on this task" — every
//! other component calls through here rather than re-deriving the check.

use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{Task, TrustTier, User};
use crate::storage::repositories::{TrustRepository, UserRepository};
use crate::storage::Storage;
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct TrustEngine {
    storage: Storage,
}

/// Missing-requirement reasons surfaced by `evaluate_promotion` so a caller
/// can render "you need N more completed tasks" style messaging.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PromotionEvaluation {
    pub current_tier: TrustTier,
    pub next_tier: Option<TrustTier>,
    pub eligible: bool,
    pub missing_reasons: Vec<String>,
}

impl TrustEngine {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// `assertEligibility({userId, taskId, isInstant})` (spec §4.6). Reads
    /// the user's tier and the task's risk from the database — never from a
    /// caller-supplied value — so a stale or forged client claim can never
    /// grant access.
    pub async fn assert_eligibility(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        _is_instant: bool,
    ) -> HustleXpResult<()> {
        let user = UserRepository::find(self.storage.pool(), user_id).await?;
        let task = crate::storage::repositories::TaskRepository::find(self.storage.pool(), task_id).await?;
        self.assert_eligibility_for(&user, &task)
    }

    /// Synchronous core of `assertEligibility` against already-loaded rows,
    /// so callers mid-transaction (e.g. `TaskEngine::accept`) don't pay for
    /// a second round trip just to re-read what they already hold.
    pub fn assert_eligibility_for(&self, user: &User, task: &Task) -> HustleXpResult<()> {
        if user.is_banned() {
            return Err(HustleXpError::user_banned());
        }

        if task.risk_tier.is_blocked_in_alpha() {
            return Err(HustleXpError::task_risk_blocked_alpha());
        }

        // Instant mode does not bypass any risk gate (spec §4.6 point 6).
        if let Some(required) = task.risk_tier.required_trust_tier() {
            if !user.trust_tier.meets_minimum(required) {
                return Err(HustleXpError::trust_tier_insufficient(json!({
                    "user_tier": user.trust_tier,
                    "required_tier": required,
                    "task_risk": task.risk_tier,
                })));
            }
        }

        Ok(())
    }

    /// `evaluatePromotion(userId)` (spec §4.6): eligibility plus missing
    /// reasons for the tier after the user's current one. No-op shape when
    /// already at ELITE or BANNED.
    pub async fn evaluate_promotion(&self, user_id: Uuid) -> HustleXpResult<PromotionEvaluation> {
        let user = UserRepository::find(self.storage.pool(), user_id).await?;
        let Some(next_tier) = user.trust_tier.next() else {
            return Ok(PromotionEvaluation {
                current_tier: user.trust_tier,
                next_tier: None,
                eligible: false,
                missing_reasons: vec![],
            });
        };

        let missing = self.missing_reasons_for(&user, next_tier).await?;
        Ok(PromotionEvaluation {
            current_tier: user.trust_tier,
            next_tier: Some(next_tier),
            eligible: missing.is_empty(),
            missing_reasons: missing,
        })
    }

    async fn missing_reasons_for(&self, user: &User, target: TrustTier) -> HustleXpResult<Vec<String>> {
        let mut missing = Vec::new();
        let pool = self.storage.pool();

        match target {
            TrustTier::Verified => {
                if !user.id_verified {
                    missing.push("id not verified".to_string());
                }
                if !user.phone_verified {
                    missing.push("phone not verified".to_string());
                }
                if !user.payment_method_verified {
                    missing.push("payment method not verified".to_string());
                }
            }
            TrustTier::Trusted => {
                let completed = TrustRepository::completed_task_count(pool, user.id).await?;
                if completed < 10 {
                    missing.push(format!("needs 10 completed tasks, has {completed}"));
                }
                let disputes = TrustRepository::dispute_count_against(pool, user.id).await?;
                if disputes > 0 {
                    missing.push(format!("has {disputes} disputes, requires zero"));
                }
                match TrustRepository::on_time_rate(pool, user.id).await? {
                    Some(rate) if rate < 0.95 => {
                        missing.push(format!("on-time rate {:.1}% below 95% threshold", rate * 100.0));
                    }
                    None => missing.push("no completed tasks to compute on-time rate".to_string()),
                    _ => {}
                }
                let age_days = (chrono::Utc::now() - user.created_at).num_days();
                if age_days < 7 {
                    missing.push(format!("account age {age_days}d below 7d threshold"));
                }
                let tier2_plus = TrustRepository::completed_tier2_plus_count(pool, user.id).await?;
                if tier2_plus > 0 {
                    missing.push("has completed TIER_2+ tasks prior to TRUSTED".to_string());
                }
            }
            TrustTier::Elite => {
                let completed = TrustRepository::completed_task_count(pool, user.id).await?;
                if completed < 25 {
                    missing.push(format!("needs 25 completed tasks, has {completed}"));
                }
                let posters = TrustRepository::distinct_poster_count(pool, user.id).await?;
                if posters < 5 {
                    missing.push(format!("needs 5 distinct posters, has {posters}"));
                }
                let age_days = (chrono::Utc::now() - user.created_at).num_days();
                if age_days < 30 {
                    missing.push(format!("account age {age_days}d below 30d threshold"));
                }
                if !user.security_deposit_locked {
                    missing.push("security deposit not locked".to_string());
                }
            }
            TrustTier::Rookie | TrustTier::Banned => {}
        }

        Ok(missing)
    }

    /// `applyPromotion(userId, targetTier, source)` (spec §4.6). Re-validates
    /// inside the transaction to guard against TOCTOU between evaluation and
    /// application, and advances exactly one tier at a time. Idempotent: a
    /// call that finds the user already at `target_tier` is a no-op.
    pub async fn apply_promotion(
        &self,
        user_id: Uuid,
        target_tier: TrustTier,
        source: &str,
    ) -> HustleXpResult<TrustTier> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let user = UserRepository::find_for_update(&mut tx, user_id).await?;

        if user.trust_tier == target_tier {
            tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
            return Ok(target_tier);
        }

        let Some(next_tier) = user.trust_tier.next() else {
            return Err(HustleXpError::invalid_state("user has no next tier to promote into"));
        };
        if next_tier != target_tier {
            return Err(HustleXpError::invalid_state(format!(
                "promotion must advance exactly one tier: next is {next_tier:?}, requested {target_tier:?}"
            )));
        }

        let missing = self.missing_reasons_for(&user, target_tier).await?;
        if !missing.is_empty() {
            return Err(HustleXpError::with_details(
                crate::error::ErrorCode::TrustTierInsufficient,
                "promotion requirements not met",
                json!({ "missing": missing }),
            ));
        }

        UserRepository::set_trust_tier(&mut tx, user_id, target_tier).await?;

        let idempotency_key = format!("trust.promoted:{user_id}:{target_tier:?}");
        TrustRepository::record_promotion(&mut tx, user_id, user.trust_tier, target_tier, source, &idempotency_key)
            .await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(target_tier)
    }

    /// `banUser(userId, reason)` (spec §4.6): terminal, cancels the user's
    /// active non-terminal tasks in the same transaction.
    pub async fn ban_user(&self, user_id: Uuid, reason: &str) -> HustleXpResult<()> {
        let mut tx = self.storage.pool().begin().await.map_err(HustleXpError::from)?;
        let user = UserRepository::find_for_update(&mut tx, user_id).await?;

        if user.trust_tier != TrustTier::Banned {
            UserRepository::set_trust_tier(&mut tx, user_id, TrustTier::Banned).await?;
            let idempotency_key = format!("trust.banned:{user_id}");
            TrustRepository::record_promotion(
                &mut tx,
                user_id,
                user.trust_tier,
                TrustTier::Banned,
                reason,
                &idempotency_key,
            )
            .await?;
        }

        TrustRepository::cancel_active_tasks_for_banned_user(&mut tx, user_id).await?;

        tx.commit().await.map_err(|e| HustleXpError::internal(format!("commit failed: {e}")))?;
        Ok(())
    }

    /// Sets or clears a user's trust hold (spec §3, §4.6). Enforced by the
    /// Task Engine *before* its atomic accept/create UPDATE, not by a kernel
    /// trigger — a hold is a gate on new commitments, not an invariant on
    /// existing rows.
    pub async fn set_trust_hold(
        &self,
        user_id: Uuid,
        hold: bool,
        reason: Option<&str>,
        until: Option<chrono::DateTime<chrono::Utc>>,
    ) -> HustleXpResult<()> {
        UserRepository::set_trust_hold(self.storage.pool(), user_id, hold, reason, until).await
    }
}
