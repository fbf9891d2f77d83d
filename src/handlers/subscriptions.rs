//! Subscriber-facing glue: create a pending subscription and check its state.
//!
//! This is what the platform's checkout flow calls before sending the user to
//! the gateway. Reconciliation never runs here - a subscription stays
//! `Pending` until the gateway's webhooks drive it through the pipeline.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::{CreateSubscription, Subscription};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions/{transaction_ref}", get(get_subscription))
}

async fn create_subscription(
    State(state): State<AppState>,
    Json(input): Json<CreateSubscription>,
) -> Result<(StatusCode, Json<Subscription>)> {
    if input.amount_minor < 0 {
        return Err(AppError::BadRequest("amount_minor must be non-negative".into()));
    }

    let conn = state.db.get()?;

    queries::get_user_by_id(&conn, &input.user_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {}", input.user_id)))?;

    if let Some(ref content_id) = input.content_id {
        queries::get_content_by_id(&conn, content_id)?
            .ok_or_else(|| AppError::NotFound(format!("content {}", content_id)))?;
    }

    let transaction_ref = EntityType::TransactionRef.gen_id();
    let sub = queries::create_subscription(&conn, &transaction_ref, &input, state.clock.now())?;

    tracing::info!(
        "Subscription {} created: user={}, ref={}, amount={}",
        sub.id,
        sub.user_id,
        sub.transaction_ref,
        sub.amount_minor
    );

    Ok((StatusCode::CREATED, Json(sub)))
}

async fn get_subscription(
    State(state): State<AppState>,
    Path(transaction_ref): Path<String>,
) -> Result<Json<Subscription>> {
    let conn = state.db.get()?;
    let sub = queries::get_subscription_by_ref(&conn, &transaction_ref)?
        .ok_or_else(|| AppError::NotFound(format!("subscription {}", transaction_ref)))?;
    Ok(Json(sub))
}
