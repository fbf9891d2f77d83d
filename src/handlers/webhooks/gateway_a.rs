//! Gateway A ingress.
//!
//! Gateway A posts a flat JSON envelope:
//! `{"id": "...", "event": "payment.updated", "transaction_ref": "..."}`.
//! The `event` field is advisory only - the pipeline resolves the
//! authoritative status by reference, never from the payload.

use axum::{body::Bytes, extract::State, response::IntoResponse};
use serde::Deserialize;

use crate::db::AppState;
use crate::models::WebhookKind;

use super::common::{ack_malformed, ingest, WebhookAck, WebhookEnvelope};

#[derive(Debug, Deserialize)]
struct GatewayAPayload {
    id: String,
    event: String,
    transaction_ref: String,
}

fn parse_envelope(body: &[u8]) -> Result<WebhookEnvelope, String> {
    let payload: GatewayAPayload =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {}", e))?;

    if payload.id.is_empty() || payload.transaction_ref.is_empty() || payload.event.is_empty() {
        return Err("missing id, event, or transaction_ref".to_string());
    }

    Ok(WebhookEnvelope {
        event_id: payload.id,
        transaction_ref: payload.transaction_ref,
    })
}

pub async fn gateway_a_ack(state: &AppState, body: &Bytes) -> WebhookAck {
    let envelope = match parse_envelope(body) {
        Ok(env) => env,
        Err(detail) => return ack_malformed(WebhookKind::GatewayA, &detail),
    };

    let raw_payload = String::from_utf8_lossy(body);
    ingest(state, WebhookKind::GatewayA, envelope, &raw_payload).await
}

/// Axum handler for Gateway A webhooks.
pub async fn handle_gateway_a_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    gateway_a_ack(&state, &body).await
}
