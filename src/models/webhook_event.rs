use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Durable record of one inbound gateway notification.
///
/// The gateway-assigned `id` is the idempotency key. Rows in `Processed` or
/// `Failed` are terminal and never mutated again; `attempt` only increases;
/// `next_retry_at` is set only while `PendingRetry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Gateway-assigned id, globally unique
    pub id: String,
    pub kind: WebhookKind,
    pub transaction_ref: String,
    /// Opaque body preserved verbatim for replay/audit
    pub raw_payload: String,
    pub status: WebhookStatus,
    /// Completed pipeline attempts
    pub attempt: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    pub next_retry_at: Option<i64>,
    pub processed_at: Option<i64>,
    pub received_at: i64,
}

/// Bounded attempt count before an event is parked as `Failed`.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebhookKind {
    GatewayA,
    GatewayB,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebhookStatus {
    Received,
    Processed,
    Failed,
    PendingRetry,
}

impl WebhookStatus {
    /// Terminal rows require operator intervention and are never re-driven.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Filters for the operator webhook-event listing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct WebhookEventFilters {
    pub status: Option<WebhookStatus>,
    pub kind: Option<WebhookKind>,
    pub transaction_ref: Option<String>,
}
