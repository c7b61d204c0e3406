use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Event types the external payment processor is required to send us
/// (spec §6). Unknown types are handled as a catch-all and marked skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventType {
    PaymentIntentSucceeded,
    TransferCreated,
    ChargeRefunded,
    #[serde(other)]
    Unknown,
}

impl PaymentEventType {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "transfer.created" => Self::TransferCreated,
            "charge.refunded" => Self::ChargeRefunded,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::TransferCreated => "transfer.created",
            Self::ChargeRefunded => "charge.refunded",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_event_result", rename_all = "snake_case")]
pub enum PaymentEventResult {
    Processing,
    Success,
    Failed,
    Skipped,
}

/// Row in `external_payment_events`. `external_id` is the primary key and
/// the dedup boundary (spec §4.5).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExternalPaymentEvent {
    pub external_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub claimed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub result: Option<PaymentEventResult>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExternalPaymentEvent {
    pub fn kind(&self) -> PaymentEventType {
        PaymentEventType::from_wire(&self.event_type)
    }
}
