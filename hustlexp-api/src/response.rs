//! The `{success, data}` / `{success: false, error}` wire contract (§6, §7).
//! This module is the entire extent of this crate's "business logic" — it
//! only ever reshapes what the core engines already decided.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hustlexp_core::{ErrorCode, HustleXpError};
use serde::Serialize;
use serde_json::json;

pub struct ApiError(pub HustleXpError);

impl From<HustleXpError> for ApiError {
    fn from(err: HustleXpError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Forbidden | ErrorCode::UserBanned | ErrorCode::TrustTierInsufficient => StatusCode::FORBIDDEN,
            ErrorCode::Duplicate => StatusCode::CONFLICT,
            ErrorCode::InvalidState
            | ErrorCode::InvalidTransition
            | ErrorCode::TaskTerminal
            | ErrorCode::EscrowTerminal
            | ErrorCode::TaskRiskBlockedAlpha
            | ErrorCode::InstantTaskTrustInsufficient
            | ErrorCode::PlanRequired
            | ErrorCode::PriceTooLow
            | ErrorCode::Live2Violation
            | ErrorCode::InstantTaskIncomplete
            | ErrorCode::RateLimitExceeded
            | ErrorCode::Invariant(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::DbError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({
            "success": false,
            "error": { "code": self.0.code, "message": self.0.message, "details": self.0.details },
        });

        (status, Json(body)).into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}
