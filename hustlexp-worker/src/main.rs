//! Background worker process: outbox dispatch, payment-event polling, and
//! stuck-job recovery. Three independent loops sharing one connection pool.

use hustlexp_core::config::CoreConfig;
use hustlexp_core::engine::PaymentIngestionWorker;
use hustlexp_core::outbox::{recover_stuck_outbox_rows, LoggingQueuePublisher, OutboxDispatcher};
use hustlexp_core::storage::repositories::PaymentEventRepository;
use hustlexp_core::Storage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = CoreConfig::load()?;
    let storage = Storage::connect(&config).await?;
    storage.migrate().await?;

    info!("hustlexp-worker starting");

    let dispatcher = OutboxDispatcher::new(storage.clone(), Arc::new(LoggingQueuePublisher));
    let dispatcher_task = tokio::spawn(async move {
        dispatcher.run(100, Duration::from_secs(2)).await;
    });

    let ingestion = PaymentIngestionWorker::new(storage.clone());
    let ingestion_task = tokio::spawn(async move {
        ingestion.run(50, Duration::from_secs(2)).await;
    });

    let recovery_storage = storage.clone();
    let recovery_timeout = config.stuck_job_timeout_secs;
    let recovery_task = tokio::spawn(async move {
        loop {
            if let Err(err) = recover_stuck_outbox_rows(&recovery_storage, recovery_timeout).await {
                error!(error = %err, "outbox stuck-job recovery failed");
            }
            if let Err(err) = PaymentEventRepository::recover_stuck(recovery_storage.pool(), recovery_timeout).await {
                error!(error = %err, "payment event stuck-job recovery failed");
            }
            tokio::time::sleep(Duration::from_secs(recovery_timeout as u64 / 2)).await;
        }
    });

    tokio::select! {
        result = dispatcher_task => result?,
        result = ingestion_task => result?,
        result = recovery_task => result?,
    }

    Ok(())
}
