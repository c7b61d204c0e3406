//! The engines that own the state machines in spec §4. Each engine is a
//! plain constructor-injected component over a [`crate::storage::Storage`]
//! handle — no module-level singletons, no late-bound imports (§9 design
//! notes). Tests construct fresh instances against a test database.

pub mod dispute;
pub mod escrow;
pub mod gates;
pub mod ledger;
pub mod payment_ingestion;
pub mod payment_processor;
pub mod recompute;
pub mod task;
pub mod trust;

pub use dispute::DisputeEngine;
pub use escrow::EscrowEngine;
pub use gates::{InstantModeGates, NoopInstantModeGates};
pub use ledger::LedgerEngine;
pub use payment_ingestion::PaymentIngestionWorker;
pub use payment_processor::{HttpPaymentProcessorClient, PaymentIntentStatus, PaymentProcessorClient};
pub use recompute::RecomputeService;
pub use task::TaskEngine;
pub use trust::TrustEngine;
