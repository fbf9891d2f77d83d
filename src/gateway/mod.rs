//! Payment-gateway status lookup.
//!
//! The gateway is the single source of truth for what actually happened to a
//! transaction. Webhook payloads only announce that something changed; the
//! pipeline always resolves the authoritative status by reference through
//! this interface, never from the payload's self-reported fields.

mod http;

pub use http::HttpGatewayClient;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authoritative transaction status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The bounded lookup timeout elapsed
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// Authoritative status lookup for a transaction reference.
///
/// Implementations must be safe to call repeatedly for the same reference and
/// must return the same answer once the gateway's state has settled.
pub trait PaymentGatewayClient: Send + Sync {
    fn status<'a>(
        &'a self,
        transaction_ref: &'a str,
    ) -> BoxFuture<'a, Result<GatewayStatus, GatewayError>>;
}
