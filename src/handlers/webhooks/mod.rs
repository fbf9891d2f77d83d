pub mod common;
pub mod gateway_a;
pub mod gateway_b;

pub use gateway_a::handle_gateway_a_webhook;
pub use gateway_b::handle_gateway_b_webhook;

use axum::{routing::post, Router};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/gateway-a", post(handle_gateway_a_webhook))
        .route("/webhooks/gateway-b", post(handle_gateway_b_webhook))
}
