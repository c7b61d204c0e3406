//! Error taxonomy for the transactional core.
//!
//! Every mutation function in this crate returns `Result<T, HustleXpError>`
//! rather than throwing across its public boundary (§7). Storage-kernel
//! invariant violations carry their stable `HX###` code verbatim so callers
//! and kill-tests can match on it exactly.

use thiserror::Error;

/// Stable error codes from the taxonomy in spec §7.
///
/// `Invariant` wraps the raw code string raised by a database trigger
/// (`HX001`, `HX201`, ...) so new invariants don't require a Rust release.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "code", content = "details")]
pub enum ErrorCode {
    /// Storage-kernel invariant violation, e.g. "HX001".
    Invariant(String),
    InvalidState,
    InvalidTransition,
    TaskTerminal,
    EscrowTerminal,
    Forbidden,
    UserBanned,
    TrustTierInsufficient,
    TaskRiskBlockedAlpha,
    InstantTaskTrustInsufficient,
    PlanRequired,
    PriceTooLow,
    Live2Violation,
    InstantTaskIncomplete,
    RateLimitExceeded,
    NotFound,
    Duplicate,
    DbError,
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Invariant(code) => write!(f, "{code}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Structured detail payload accompanying a denied operation (§7: "a denied
/// eligibility check returns both code and a structured `details` object").
pub type ErrorDetails = serde_json::Value;

/// Main error type for the transactional core.
#[derive(Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct HustleXpError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<ErrorDetails>,
}

impl HustleXpError {
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details<S: Into<String>>(
        code: ErrorCode,
        message: S,
        details: ErrorDetails,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Build an error from a raw storage-kernel invariant code (e.g. a
    /// Postgres trigger's `RAISE EXCEPTION 'HX001: ...'`).
    pub fn invariant<S: Into<String>>(code: S, message: S) -> Self {
        let code = code.into();
        Self::new(ErrorCode::Invariant(code), message)
    }

    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    pub fn invalid_transition(from: &str, to: &str, reason: &str) -> Self {
        Self::with_details(
            ErrorCode::InvalidTransition,
            format!("invalid transition {from} -> {to}: {reason}"),
            serde_json::json!({ "from": from, "to": to, "reason": reason }),
        )
    }

    pub fn task_terminal() -> Self {
        Self::new(ErrorCode::TaskTerminal, "task is in a terminal state")
    }

    pub fn escrow_terminal() -> Self {
        Self::new(ErrorCode::EscrowTerminal, "escrow is in a terminal state")
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn user_banned() -> Self {
        Self::new(ErrorCode::UserBanned, "user is banned")
    }

    pub fn trust_tier_insufficient(details: ErrorDetails) -> Self {
        Self::with_details(
            ErrorCode::TrustTierInsufficient,
            "user's trust tier is insufficient for this task",
            details,
        )
    }

    pub fn task_risk_blocked_alpha() -> Self {
        Self::new(
            ErrorCode::TaskRiskBlockedAlpha,
            "task risk tier is blocked in alpha",
        )
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn duplicate<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::Duplicate, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn price_too_low<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::PriceTooLow, message)
    }
}

impl From<sqlx::Error> for HustleXpError {
    fn from(err: sqlx::Error) -> Self {
        // A RAISE EXCEPTION from a kernel trigger surfaces to sqlx as a
        // Database error whose message we authored as "HX###: reason".
        if let sqlx::Error::Database(db_err) = &err {
            let msg = db_err.message();
            if let Some(code) = msg.split(':').next() {
                if code.starts_with("HX") && code.len() <= 6 {
                    return HustleXpError::invariant(code.to_string(), msg.to_string());
                }
            }
            if db_err.is_unique_violation() {
                return HustleXpError::new(ErrorCode::Duplicate, msg.to_string());
            }
        }
        HustleXpError::new(ErrorCode::DbError, err.to_string())
    }
}

pub type HustleXpResult<T> = Result<T, HustleXpError>;
