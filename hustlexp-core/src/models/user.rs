use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Trust tiers, total order except `Banned` which is terminal and
/// incomparable (spec §4.6). Declared in ascending order so `#[derive(Ord)]`
/// matches the spec's total order for every tier but `Banned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "trust_tier", rename_all = "snake_case")]
pub enum TrustTier {
    Rookie,
    Verified,
    Trusted,
    Elite,
    Banned,
}

impl TrustTier {
    /// True ordered comparison per spec: ROOKIE < VERIFIED < TRUSTED < ELITE,
    /// with BANNED incomparable to everything (never satisfies a minimum).
    pub fn meets_minimum(self, required: TrustTier) -> bool {
        if self == TrustTier::Banned {
            return false;
        }
        self >= required
    }

    pub fn next(self) -> Option<TrustTier> {
        match self {
            TrustTier::Rookie => Some(TrustTier::Verified),
            TrustTier::Verified => Some(TrustTier::Trusted),
            TrustTier::Trusted => Some(TrustTier::Elite),
            TrustTier::Elite | TrustTier::Banned => None,
        }
    }

    /// Multiplier used by the XP formula in spec §3.
    pub fn xp_multiplier(self) -> f64 {
        match self {
            TrustTier::Rookie => 1.0,
            TrustTier::Verified => 1.5,
            TrustTier::Trusted | TrustTier::Elite => 2.0,
            TrustTier::Banned => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_plan", rename_all = "snake_case")]
pub enum UserPlan {
    Free,
    Premium,
    Pro,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role_hint: Option<String>,
    pub trust_tier: TrustTier,

    pub trust_hold: bool,
    pub trust_hold_reason: Option<String>,
    pub trust_hold_until: Option<DateTime<Utc>>,

    pub payouts_locked: bool,
    pub payouts_locked_reason: Option<String>,
    pub payouts_locked_at: Option<DateTime<Utc>>,

    pub plan: UserPlan,
    pub plan_subscribed_at: Option<DateTime<Utc>>,
    pub plan_expires_at: Option<DateTime<Utc>>,

    pub phone_verified: bool,
    pub payment_method_verified: bool,
    pub id_verified: bool,

    pub xp_total: i64,
    pub current_streak_days: i32,

    pub security_deposit_locked: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_banned(&self) -> bool {
        self.trust_tier == TrustTier::Banned
    }

    pub fn has_active_hold(&self, now: DateTime<Utc>) -> bool {
        self.trust_hold && self.trust_hold_until.map(|until| now < until).unwrap_or(true)
    }
}
