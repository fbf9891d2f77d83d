//! Gateway-agnostic webhook ingestion.
//!
//! The ingress contract is ack-always: whatever happens internally, the
//! gateway gets a 200. A non-200 would make the gateway redeliver
//! uncontrollably with no corrective value - recovery from internal failures
//! belongs to the retry scheduler, not the delivery channel.

use axum::http::StatusCode;

use crate::db::{queries, AppState};
use crate::models::{WebhookKind, WebhookStatus};
use crate::reconcile::pipeline;

/// Response type for webhook operations. The status code is always OK.
pub type WebhookAck = (StatusCode, &'static str);

/// Provider-agnostic fields extracted from a gateway-specific payload.
#[derive(Debug)]
pub struct WebhookEnvelope {
    /// Gateway-assigned notification id - the idempotency key
    pub event_id: String,
    /// Reference correlating the notification to a subscription
    pub transaction_ref: String,
}

/// Persist the webhook log row and drive the pipeline once, synchronously.
///
/// Duplicates (an id already present in the log) are acknowledged without
/// reprocessing, unless the prior attempt is still parked in `PendingRetry` -
/// then the redelivery is treated as a free retry and processed normally.
pub async fn ingest(
    state: &AppState,
    kind: WebhookKind,
    envelope: WebhookEnvelope,
    raw_payload: &str,
) -> WebhookAck {
    let event = {
        let conn = match state.db.get() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(
                    "Cannot persist webhook {}: database pool unavailable: {}",
                    envelope.event_id,
                    e
                );
                return (StatusCode::OK, "accepted");
            }
        };

        let inserted = match queries::try_insert_webhook_event(
            &conn,
            &envelope.event_id,
            kind,
            &envelope.transaction_ref,
            raw_payload,
            state.clock.now(),
        ) {
            Ok(i) => i,
            Err(e) => {
                tracing::error!("Failed to log webhook {}: {}", envelope.event_id, e);
                return (StatusCode::OK, "accepted");
            }
        };

        let existing = match queries::get_webhook_event(&conn, &envelope.event_id) {
            Ok(Some(ev)) => ev,
            Ok(None) => {
                tracing::error!("Webhook {} vanished after insert", envelope.event_id);
                return (StatusCode::OK, "accepted");
            }
            Err(e) => {
                tracing::error!("Failed to load webhook {}: {}", envelope.event_id, e);
                return (StatusCode::OK, "accepted");
            }
        };

        if !inserted {
            if existing.status != WebhookStatus::PendingRetry {
                tracing::info!(
                    "Duplicate webhook {} (status {}), acknowledging without reprocessing",
                    existing.id,
                    existing.status
                );
                return (StatusCode::OK, "duplicate ignored");
            }
            // Redelivery of an event we were going to retry anyway.
            tracing::info!("Duplicate webhook {} is pending retry, reprocessing", existing.id);
        }

        existing
    };

    if let Err(e) = pipeline::run_and_record(state, &event).await {
        tracing::error!("Failed to record outcome for webhook {}: {}", event.id, e);
    }

    (StatusCode::OK, "accepted")
}

/// Acknowledge a payload that cannot be parsed into this gateway's envelope.
/// Logged for the operators; never bounced back to the gateway.
pub fn ack_malformed(kind: WebhookKind, detail: &str) -> WebhookAck {
    tracing::warn!(
        "Malformed {} webhook acknowledged without processing: {}",
        kind.as_ref(),
        detail
    );
    (StatusCode::OK, "ignored")
}
