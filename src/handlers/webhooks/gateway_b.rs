//! Gateway B ingress.
//!
//! Gateway B nests its reference under a data object and names fields
//! differently: `{"notification_id": "...", "action": "...",
//! "data": {"reference": "..."}}`. Parsed into the same envelope as Gateway A.

use axum::{body::Bytes, extract::State, response::IntoResponse};
use serde::Deserialize;

use crate::db::AppState;
use crate::models::WebhookKind;

use super::common::{ack_malformed, ingest, WebhookAck, WebhookEnvelope};

#[derive(Debug, Deserialize)]
struct GatewayBPayload {
    notification_id: String,
    action: String,
    data: GatewayBData,
}

#[derive(Debug, Deserialize)]
struct GatewayBData {
    reference: String,
}

fn parse_envelope(body: &[u8]) -> Result<WebhookEnvelope, String> {
    let payload: GatewayBPayload =
        serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {}", e))?;

    if payload.notification_id.is_empty()
        || payload.action.is_empty()
        || payload.data.reference.is_empty()
    {
        return Err("missing notification_id, action, or data.reference".to_string());
    }

    Ok(WebhookEnvelope {
        event_id: payload.notification_id,
        transaction_ref: payload.data.reference,
    })
}

pub async fn gateway_b_ack(state: &AppState, body: &Bytes) -> WebhookAck {
    let envelope = match parse_envelope(body) {
        Ok(env) => env,
        Err(detail) => return ack_malformed(WebhookKind::GatewayB, &detail),
    };

    let raw_payload = String::from_utf8_lossy(body);
    ingest(state, WebhookKind::GatewayB, envelope, &raw_payload).await
}

/// Axum handler for Gateway B webhooks.
pub async fn handle_gateway_b_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    gateway_b_ack(&state, &body).await
}
