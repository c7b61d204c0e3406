//! Transactional core for the HustleXP task marketplace.
//!
//! This crate is the authoritative backend for escrow custody, task
//! lifecycle, trust/eligibility, payment ingestion, and the outbox fabric
//! that ties them together. Everything else (HTTP edge, auth middleware,
//! notifications, analytics, mobile clients) is an external collaborator
//! that only ever calls through the engines exposed here.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod outbox;
pub mod storage;

pub use config::CoreConfig;
pub use error::{ErrorCode, HustleXpError, HustleXpResult};
pub use storage::Storage;
