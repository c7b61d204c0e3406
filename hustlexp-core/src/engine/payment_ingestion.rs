//! Payment Ingestion (spec §4.5). Webhook bodies land in
//! `external_payment_events` at the HTTP edge (out of scope here); this
//! worker claims rows and drives the Escrow Engine's state machine off them.
//! It never releases LOCKED_DISPUTE escrows — that's the Dispute Engine's
//! exclusive path (P9).

use crate::engine::{EscrowEngine, NoopInstantModeGates, TaskEngine, TrustEngine};
use crate::error::{HustleXpError, HustleXpResult};
use crate::models::{EscrowState, PaymentEventResult, PaymentEventType, ProgressActor, TaskProgressState};
use crate::storage::repositories::{EscrowRepository, PaymentEventRepository, TaskRepository};
use crate::storage::Storage;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentIngestionWorker {
    storage: Storage,
    escrow: EscrowEngine,
}

/// Whether a dispatched event produced a business-state change or was a
/// legitimate no-op (spec §4.5 points 4-5: terminal-skip, unknown type).
enum DispatchOutcome {
    Applied,
    Skipped(String),
}

impl PaymentIngestionWorker {
    pub fn new(storage: Storage) -> Self {
        let escrow = EscrowEngine::new(storage.clone());
        Self { storage, escrow }
    }

    /// Inbound webhook entrypoint: insert-or-dedup then claim-and-process.
    /// A duplicate `external_id` surfaces as `ErrorCode::Duplicate` from
    /// `ingest`; the caller (HTTP edge) should treat that as a 200, not a
    /// retry signal — the processor will just resend otherwise.
    pub async fn ingest(&self, external_id: &str, event_type: &str, payload: serde_json::Value) -> HustleXpResult<()> {
        PaymentEventRepository::ingest(self.storage.pool(), external_id, event_type, payload).await?;
        self.process(external_id).await
    }

    /// Claims and processes one event. Returns `Ok(())` silently if the row
    /// was already claimed or processed by a concurrent worker — `try_claim`
    /// is the only dedup authority here (spec §4.5 "at-least-once delivery,
    /// exactly-once effect").
    pub async fn process(&self, external_id: &str) -> HustleXpResult<()> {
        let Some(event) = PaymentEventRepository::try_claim(self.storage.pool(), external_id).await? else {
            return Ok(());
        };

        let kind = event.kind();
        self.dispatch_and_finalize(external_id, &event.payload, kind).await
    }

    /// Claims up to `batch_size` backlog rows (webhook deliveries that never
    /// got an inline `process` call, e.g. because the HTTP edge only enqueued
    /// them) and processes each. Intended for the worker binary's poll loop.
    pub async fn poll_once(&self, batch_size: i64) -> HustleXpResult<usize> {
        let events = PaymentEventRepository::claim_batch(self.storage.pool(), batch_size).await?;
        let count = events.len();
        for event in events {
            let kind = event.kind();
            if let Err(err) = self.dispatch_and_finalize(&event.external_id, &event.payload, kind).await {
                warn!(external_id = %event.external_id, error = %err, "payment event batch processing failed");
            }
        }
        Ok(count)
    }

    /// Run forever, polling every `interval`. Intended for the worker binary.
    pub async fn run(&self, batch_size: i64, interval: std::time::Duration) -> ! {
        loop {
            if let Err(err) = self.poll_once(batch_size).await {
                warn!(error = %err, "payment ingestion poll cycle failed");
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn dispatch_and_finalize(
        &self,
        external_id: &str,
        payload: &serde_json::Value,
        kind: PaymentEventType,
    ) -> HustleXpResult<()> {
        let result = self.dispatch(payload, kind).await;

        match &result {
            Ok(DispatchOutcome::Applied) => {
                PaymentEventRepository::finalize(self.storage.pool(), external_id, PaymentEventResult::Success, None)
                    .await?;
            }
            // Terminal-skip and unknown-type events are `skipped`, not
            // `success` (spec §4.5 points 4-5) — they never produced a
            // business-state change.
            Ok(DispatchOutcome::Skipped(note)) => {
                PaymentEventRepository::finalize(
                    self.storage.pool(),
                    external_id,
                    PaymentEventResult::Skipped,
                    Some(note),
                )
                .await?;
            }
            Err(err) => {
                warn!(external_id, error = %err, "payment event processing failed");
                PaymentEventRepository::finalize(
                    self.storage.pool(),
                    external_id,
                    PaymentEventResult::Failed,
                    Some(&err.message),
                )
                .await?;
            }
        }

        result.map(|_| ())
    }

    async fn dispatch(&self, payload: &serde_json::Value, kind: PaymentEventType) -> HustleXpResult<DispatchOutcome> {
        if matches!(kind, PaymentEventType::Unknown) {
            info!(?kind, "skipping unrecognized payment event type");
            return Ok(DispatchOutcome::Skipped("unrecognized event type".to_string()));
        }

        let escrow_id = payload
            .get("metadata")
            .and_then(|m| m.get("escrow_id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| HustleXpError::invalid_state("payment event payload missing metadata.escrow_id"))?;

        let external_ref = payload
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let escrow = EscrowRepository::find(self.storage.pool(), escrow_id).await?;

        // Already-terminal escrow: a replayed or out-of-order event. Skip
        // rather than error, since the kernel's transition guard would
        // reject it anyway and this isn't a failure worth retrying.
        if escrow.state.is_terminal() {
            info!(%escrow_id, ?kind, "escrow already terminal, skipping");
            return Ok(DispatchOutcome::Skipped(format!("escrow already {:?}", escrow.state)));
        }
        // LOCKED_DISPUTE release is blocked unconditionally (P9): a transfer
        // must never release an escrow that's under dispute, only explicit
        // resolution may. `charge.refunded` is explicitly allowed to
        // transition LOCKED_DISPUTE -> REFUNDED (spec §4.5 point 2) since a
        // refund from the processor doesn't contradict an open dispute the
        // way a worker payout would.
        if escrow.state == EscrowState::LockedDispute && kind == PaymentEventType::TransferCreated {
            info!(%escrow_id, ?kind, "escrow locked for dispute, release deferred to dispute resolution");
            return Ok(DispatchOutcome::Skipped("escrow locked for dispute".to_string()));
        }

        match kind {
            PaymentEventType::PaymentIntentSucceeded => {
                if let Some(reported) = payload.get("amount").and_then(|v| v.as_i64()) {
                    if reported != escrow.amount_cents {
                        return Err(HustleXpError::invalid_state(format!(
                            "payment_intent.succeeded amount {reported} does not match escrow {escrow_id} amount {}",
                            escrow.amount_cents
                        )));
                    }
                }
                self.escrow.fund(escrow_id, &external_ref).await?;
            }
            PaymentEventType::TransferCreated => {
                self.escrow.release(escrow_id).await?;
                self.close_task_progress(escrow.task_id).await?;
            }
            PaymentEventType::ChargeRefunded => {
                self.escrow.refund(escrow_id, &external_ref).await?;
                self.close_task_progress(escrow.task_id).await?;
            }
            PaymentEventType::Unknown => unreachable!("handled above"),
        }

        Ok(DispatchOutcome::Applied)
    }

    /// Advances the task's progress state to CLOSED once its escrow has left
    /// the system (spec §4.4: CLOSED is the terminal progress state, reached
    /// only after funds have moved).
    async fn close_task_progress(&self, task_id: Uuid) -> HustleXpResult<()> {
        let task = TaskRepository::find(self.storage.pool(), task_id).await?;
        if task.progress_state == TaskProgressState::Closed {
            return Ok(());
        }

        let trust = TrustEngine::new(self.storage.clone());
        let gates: Arc<dyn crate::engine::InstantModeGates> = Arc::new(NoopInstantModeGates::default());
        TaskEngine::new(self.storage.clone(), trust, gates, crate::config::CoreConfig::default())
            .advance_progress(task_id, TaskProgressState::Closed, ProgressActor::System)
            .await
    }
}
