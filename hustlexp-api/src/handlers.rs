use crate::response::{ok, ApiError};
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use hustlexp_core::engine::dispute::{CreateDisputeParams, ResolutionOutcome};
use hustlexp_core::engine::task::CreateTaskParams;
use hustlexp_core::engine::{DisputeEngine, LedgerEngine, PaymentIngestionWorker, TaskEngine, TrustEngine};
use hustlexp_core::models::{ProgressActor, TaskMode, TaskProgressState, TaskRiskTier};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateTaskBody {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub location: Option<String>,
    pub category: Option<String>,
    pub requires_proof: bool,
    pub risk_tier: TaskRiskTier,
    pub mode: TaskMode,
    pub instant_mode: bool,
    pub sensitive: bool,
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<CreateTaskBody>,
) -> Result<Json<Value>, ApiError> {
    let engine = state.task_engine();
    let task = engine
        .create(CreateTaskParams {
            owner_id: body.owner_id,
            title: body.title,
            description: body.description,
            price_cents: body.price_cents,
            location: body.location,
            category: body.category,
            requires_proof: body.requires_proof,
            risk_tier: body.risk_tier,
            mode: body.mode,
            instant_mode: body.instant_mode,
            sensitive: body.sensitive,
            recurring_series_id: None,
            due_at: None,
        })
        .await?;
    Ok(ok(task))
}

#[derive(Deserialize)]
pub struct AcceptTaskBody {
    pub worker_id: Uuid,
}

pub async fn accept_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<AcceptTaskBody>,
) -> Result<Json<Value>, ApiError> {
    let task = state.task_engine().accept(task_id, body.worker_id).await?;
    Ok(ok(task))
}

#[derive(Deserialize)]
pub struct SubmitProofBody {
    pub submitter_id: Uuid,
    pub description: Option<String>,
    pub media: Option<Value>,
}

pub async fn submit_proof(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<SubmitProofBody>,
) -> Result<Json<Value>, ApiError> {
    let task = state
        .task_engine()
        .submit_proof(task_id, body.submitter_id, body.description.as_deref(), body.media)
        .await?;
    Ok(ok(task))
}

#[derive(Deserialize)]
pub struct CompleteTaskBody {
    pub proof_id: Option<Uuid>,
}

pub async fn complete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<CompleteTaskBody>,
) -> Result<Json<Value>, ApiError> {
    let task = state.task_engine().complete(task_id, body.proof_id).await?;
    Ok(ok(task))
}

#[derive(Deserialize)]
pub struct AdvanceProgressBody {
    pub to: TaskProgressState,
    pub actor: ProgressActorWire,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressActorWire {
    Worker,
    System,
}

pub async fn advance_progress(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<AdvanceProgressBody>,
) -> Result<Json<Value>, ApiError> {
    let actor = match body.actor {
        ProgressActorWire::Worker => ProgressActor::Worker,
        ProgressActorWire::System => ProgressActor::System,
    };
    let task = state.task_engine().advance_progress(task_id, body.to, actor).await?;
    Ok(ok(task))
}

#[derive(Deserialize)]
pub struct CreateDisputeBody {
    pub task_id: Uuid,
    pub escrow_id: Uuid,
    pub initiated_by: Uuid,
    pub poster_id: Uuid,
    pub worker_id: Uuid,
    pub reason: String,
}

pub async fn create_dispute(
    State(state): State<AppState>,
    Json(body): Json<CreateDisputeBody>,
) -> Result<Json<Value>, ApiError> {
    let dispute = DisputeEngine::new(state.storage.clone())
        .create(CreateDisputeParams {
            task_id: body.task_id,
            escrow_id: body.escrow_id,
            initiated_by: body.initiated_by,
            poster_id: body.poster_id,
            worker_id: body.worker_id,
            reason: body.reason,
        })
        .await?;
    Ok(ok(dispute))
}

#[derive(Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveDisputeBody {
    Release { resolved_by: Uuid },
    Refund { resolved_by: Uuid },
    Split { resolved_by: Uuid, refund_cents: i64, release_cents: i64 },
}

pub async fn resolve_dispute(
    State(state): State<AppState>,
    Path(dispute_id): Path<Uuid>,
    Json(body): Json<ResolveDisputeBody>,
) -> Result<Json<Value>, ApiError> {
    let engine = DisputeEngine::new(state.storage.clone());
    let (resolved_by, outcome) = match body {
        ResolveDisputeBody::Release { resolved_by } => (resolved_by, ResolutionOutcome::Release),
        ResolveDisputeBody::Refund { resolved_by } => (resolved_by, ResolutionOutcome::Refund),
        ResolveDisputeBody::Split { resolved_by, refund_cents, release_cents } => {
            (resolved_by, ResolutionOutcome::Split { refund_cents, release_cents })
        }
    };
    let dispute = engine.resolve(dispute_id, resolved_by, outcome).await?;
    Ok(ok(dispute))
}

pub async fn evaluate_promotion(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let evaluation = TrustEngine::new(state.storage.clone()).evaluate_promotion(user_id).await?;
    Ok(ok(evaluation))
}

#[derive(Deserialize)]
pub struct PayTaxBody {
    pub payment_intent_id: String,
}

pub async fn pay_tax(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<PayTaxBody>,
) -> Result<Json<Value>, ApiError> {
    let settled = LedgerEngine::new(state.storage.clone(), state.processor.clone())
        .pay_tax(user_id, &body.payment_intent_id)
        .await?;
    Ok(ok(settled))
}

#[derive(Deserialize)]
pub struct PaymentWebhookBody {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub payload: Value,
}

/// Payment processor webhook delivery. Per spec §6, a duplicate delivery is
/// a 200, not a retry signal — `ingest` treats `ErrorCode::Duplicate` from
/// the insert as already-handled.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(body): Json<PaymentWebhookBody>,
) -> Result<Json<Value>, ApiError> {
    let worker = PaymentIngestionWorker::new(state.storage.clone());
    match worker.ingest(&body.id, &body.event_type, body.payload).await {
        Ok(()) => Ok(ok(serde_json::json!({ "received": true }))),
        Err(err) if err.code == hustlexp_core::ErrorCode::Duplicate => {
            Ok(ok(serde_json::json!({ "received": true, "duplicate": true })))
        }
        Err(err) => Err(err.into()),
    }
}
