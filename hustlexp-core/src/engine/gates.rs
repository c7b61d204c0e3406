//! Interface abstractions for the collaborators instant-mode task creation
//! and acceptance consult before touching the database (spec §4.4, §6).
//!
//! The source this spec was distilled from reached these through dynamic
//! imports / late binding to break module cycles and to let tests swap in
//! fakes. The idiomatic replacement is a trait passed at construction (§9):
//! no runtime import, no cycle, and a test can hand the engine a fake gate
//! without touching global state.

use crate::error::HustleXpResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Kill switches, per-user rate limiting, and the AI task-completeness gate
/// that instant-mode task creation/acceptance consults (spec §4.4).
#[async_trait]
pub trait InstantModeGates: Send + Sync {
    /// Global kill switch for instant mode. When `false`, instant task
    /// creation and acceptance are rejected outright.
    fn instant_mode_enabled(&self) -> bool;

    /// Per-user rolling rate limit on instant task creation.
    async fn check_rate_limit(&self, user_id: Uuid) -> HustleXpResult<()>;

    /// AI-assisted completeness gate: rejects instant task creation when
    /// the submitted title/description don't describe a completable task.
    /// Out of scope per §1 (AI-assisted pricing/classification); this trait
    /// is the seam a real classifier plugs into.
    async fn check_task_completeness(&self, title: &str, description: Option<&str>) -> HustleXpResult<()>;
}

/// Default gate: instant mode on, no rate limiting, completeness always
/// passes. Safe for tests and for a deploy with no classifier wired up yet.
pub struct NoopInstantModeGates {
    pub enabled: bool,
}

impl Default for NoopInstantModeGates {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[async_trait]
impl InstantModeGates for NoopInstantModeGates {
    fn instant_mode_enabled(&self) -> bool {
        self.enabled
    }

    async fn check_rate_limit(&self, _user_id: Uuid) -> HustleXpResult<()> {
        Ok(())
    }

    async fn check_task_completeness(&self, title: &str, _description: Option<&str>) -> HustleXpResult<()> {
        if title.trim().is_empty() {
            return Err(crate::error::HustleXpError::new(
                crate::error::ErrorCode::InstantTaskIncomplete,
                "instant task title must not be empty",
            ));
        }
        Ok(())
    }
}
