use crate::error::HustleXpResult;
use async_trait::async_trait;
use serde_json::Value;

/// Abstraction over the named external queues the dispatcher enqueues into
/// (spec §6: `critical_payments`, `user_notifications`, others). Kept as a
/// trait object at the outbox/worker boundary so the dispatcher never
/// depends on a concrete broker.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    async fn publish(&self, queue: &str, idempotency_key: &str, payload: Value) -> HustleXpResult<()>;
}

/// No-op publisher used in tests and as a safe default before a real broker
/// is wired in; logs what it would have sent.
pub struct LoggingQueuePublisher;

#[async_trait]
impl QueuePublisher for LoggingQueuePublisher {
    async fn publish(&self, queue: &str, idempotency_key: &str, _payload: Value) -> HustleXpResult<()> {
        tracing::debug!(queue, idempotency_key, "publishing outbox event");
        Ok(())
    }
}
