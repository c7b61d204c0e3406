pub mod admin;
pub mod capability;
pub mod disputes;
pub mod escrows;
pub mod ledger;
pub mod payment_events;
pub mod proofs;
pub mod tasks;
pub mod trust;
pub mod users;

pub use admin::AdminRepository;
pub use capability::CapabilityRepository;
pub use disputes::DisputeRepository;
pub use escrows::EscrowRepository;
pub use ledger::LedgerRepository;
pub use payment_events::PaymentEventRepository;
pub use proofs::ProofRepository;
pub use tasks::TaskRepository;
pub use trust::TrustRepository;
pub use users::UserRepository;
