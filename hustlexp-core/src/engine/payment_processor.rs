//! Outbound interface to the external payment processor (spec §6): create
//! payment intent, create transfer, create refund, verify payment intent.
//! Transfer/refund metadata carries `escrow_id` — that's how inbound
//! webhook events get correlated back to an escrow in §4.5.

use crate::error::{HustleXpError, HustleXpResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentStatus {
    pub external_id: String,
    pub succeeded: bool,
    pub amount_cents: i64,
    /// Present on tax payments (spec §4.8: `payTax` requires `type=xp_tax`).
    pub kind: Option<String>,
}

#[async_trait]
pub trait PaymentProcessorClient: Send + Sync {
    async fn create_payment_intent(&self, amount_cents: i64, escrow_id: Uuid) -> HustleXpResult<String>;
    async fn create_transfer(&self, amount_cents: i64, escrow_id: Uuid) -> HustleXpResult<String>;
    async fn create_refund(&self, payment_intent_id: &str, amount_cents: i64, escrow_id: Uuid) -> HustleXpResult<String>;
    async fn verify_payment_intent(&self, payment_intent_id: &str) -> HustleXpResult<PaymentIntentStatus>;
}

/// Thin `reqwest` client against the processor's REST API. Bounded retries
/// with exponential backoff per §5; unrecoverable failures surface as
/// `ErrorCode::DbError`-adjacent internal errors for the caller to map.
pub struct HttpPaymentProcessorClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentProcessorClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), api_key: api_key.into() }
    }

    async fn post_with_retry(&self, path: &str, body: serde_json::Value) -> HustleXpResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        loop {
            let result = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| HustleXpError::internal(format!("processor response decode failed: {e}")));
                }
                Ok(resp) => {
                    let status = resp.status();
                    if attempt >= 3 || status.is_client_error() {
                        return Err(HustleXpError::internal(format!("processor call failed: {status}")));
                    }
                }
                Err(err) => {
                    if attempt >= 3 {
                        return Err(HustleXpError::internal(format!("processor call failed: {err}")));
                    }
                }
            }
            attempt += 1;
            tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt))).await;
        }
    }
}

#[async_trait]
impl PaymentProcessorClient for HttpPaymentProcessorClient {
    async fn create_payment_intent(&self, amount_cents: i64, escrow_id: Uuid) -> HustleXpResult<String> {
        let body = self
            .post_with_retry("/v1/payment_intents", serde_json::json!({
                "amount_cents": amount_cents,
                "metadata": { "escrow_id": escrow_id },
            }))
            .await?;
        extract_id(&body)
    }

    async fn create_transfer(&self, amount_cents: i64, escrow_id: Uuid) -> HustleXpResult<String> {
        let body = self
            .post_with_retry("/v1/transfers", serde_json::json!({
                "amount_cents": amount_cents,
                "metadata": { "escrow_id": escrow_id },
            }))
            .await?;
        extract_id(&body)
    }

    async fn create_refund(&self, payment_intent_id: &str, amount_cents: i64, escrow_id: Uuid) -> HustleXpResult<String> {
        let body = self
            .post_with_retry("/v1/refunds", serde_json::json!({
                "payment_intent_id": payment_intent_id,
                "amount_cents": amount_cents,
                "metadata": { "escrow_id": escrow_id },
            }))
            .await?;
        extract_id(&body)
    }

    async fn verify_payment_intent(&self, payment_intent_id: &str) -> HustleXpResult<PaymentIntentStatus> {
        let body = self
            .post_with_retry(&format!("/v1/payment_intents/{payment_intent_id}/verify"), serde_json::json!({}))
            .await?;

        Ok(PaymentIntentStatus {
            external_id: payment_intent_id.to_string(),
            succeeded: body.get("succeeded").and_then(|v| v.as_bool()).unwrap_or(false),
            amount_cents: body.get("amount_cents").and_then(|v| v.as_i64()).unwrap_or(0),
            kind: body.get("type").and_then(|v| v.as_str()).map(String::from),
        })
    }
}

fn extract_id(body: &serde_json::Value) -> HustleXpResult<String> {
    body.get("id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| HustleXpError::internal("processor response missing id"))
}
