//! Thin REST adapter over `hustlexp-core` (spec §1, §6). Every handler is a
//! deserialize-dispatch-reshape; no handler decides anything an engine
//! hasn't already decided.

mod handlers;
mod response;

use axum::routing::{get, post};
use axum::Router;
use hustlexp_core::config::CoreConfig;
use hustlexp_core::engine::{
    HttpPaymentProcessorClient, InstantModeGates, NoopInstantModeGates, PaymentProcessorClient, TaskEngine,
    TrustEngine,
};
use hustlexp_core::storage::Storage;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    storage: Storage,
    config: CoreConfig,
    gates: Arc<dyn InstantModeGates>,
    processor: Arc<dyn PaymentProcessorClient>,
}

impl AppState {
    fn task_engine(&self) -> TaskEngine {
        TaskEngine::new(
            self.storage.clone(),
            TrustEngine::new(self.storage.clone()),
            self.gates.clone(),
            self.config.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = CoreConfig::load()?;
    let storage = Storage::connect(&config).await?;
    storage.migrate().await?;

    let gates: Arc<dyn InstantModeGates> = Arc::new(NoopInstantModeGates { enabled: config.instant_mode_enabled });
    let processor: Arc<dyn PaymentProcessorClient> = Arc::new(HttpPaymentProcessorClient::new(
        config.payment_processor_base_url.clone(),
        config.payment_processor_api_key.clone(),
    ));
    let state = AppState { storage, config, gates, processor };

    let app = Router::new()
        .route("/tasks", post(handlers::create_task))
        .route("/tasks/:id/accept", post(handlers::accept_task))
        .route("/tasks/:id/proof", post(handlers::submit_proof))
        .route("/tasks/:id/complete", post(handlers::complete_task))
        .route("/tasks/:id/progress", post(handlers::advance_progress))
        .route("/disputes", post(handlers::create_dispute))
        .route("/disputes/:id/resolve", post(handlers::resolve_dispute))
        .route("/users/:id/promotion", get(handlers::evaluate_promotion))
        .route("/users/:id/pay-tax", post(handlers::pay_tax))
        .route("/webhooks/payments", post(handlers::payment_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    info!("hustlexp-api listening on 0.0.0.0:8080");
    axum::serve(listener, app).await?;

    Ok(())
}
