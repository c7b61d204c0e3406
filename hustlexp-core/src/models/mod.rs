//! Core data models for the transactional core (spec §3).
//!
//! These are plain row-shaped structs returned by the storage layer; the
//! state machines and invariants that govern their transitions live in
//! `engine`, `trust`, `dispute`, and `ledger`, with the storage kernel
//! (`storage::migrations`) as the last line of defense regardless of which
//! Rust component wrote the row.

mod capability;
mod dispute;
mod escrow;
mod ledger;
mod outbox;
mod payment_event;
mod proof;
mod task;
mod user;

pub use capability::*;
pub use dispute::*;
pub use escrow::*;
pub use ledger::*;
pub use outbox::*;
pub use payment_event::*;
pub use proof::*;
pub use task::*;
pub use user::*;
