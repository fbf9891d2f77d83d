//! Operator surface: webhook-log inspection and manual retry control.
//!
//! Authenticated with a single deploy-time bearer token compared in constant
//! time. Terminal events (`processed`/`failed`) cannot be re-driven from
//! here; a forced retry of a failed event would violate the terminal-row
//! invariant, so it is refused with a conflict.

use axum::{
    extract::{Path, Query, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::{WebhookEvent, WebhookEventFilters, WebhookKind, WebhookStatus};
use crate::pagination::Paginated;
use crate::reconcile::{self, SweepStats};
use crate::util::extract_bearer_token;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/ops/webhook-events", get(list_webhook_events))
        .route("/ops/webhook-events/{id}/retry", post(force_retry))
        .route("/ops/sweep", post(trigger_sweep))
        .layer(middleware::from_fn_with_state(state, require_operator))
}

/// Bearer-token check for all operator routes. With no key configured the
/// surface is disabled entirely.
async fn require_operator(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let Some(ref expected) = state.operator_api_key else {
        return Err(AppError::Unauthorized);
    };

    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        Err(AppError::Unauthorized)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<WebhookStatus>,
    kind: Option<WebhookKind>,
    transaction_ref: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_webhook_events(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<WebhookEvent>>> {
    let conn = state.db.get()?;

    let filters = WebhookEventFilters {
        status: query.status,
        kind: query.kind,
        transaction_ref: query.transaction_ref.clone(),
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let (items, total) = queries::list_webhook_events(&conn, &filters, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

#[derive(Debug, Serialize)]
struct RetryResponse {
    id: String,
    status: WebhookStatus,
}

/// Force an immediate retry of one event, bypassing its backoff timestamp.
async fn force_retry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RetryResponse>> {
    let event = {
        let conn = state.db.get()?;
        queries::get_webhook_event(&conn, &id)?
            .ok_or_else(|| AppError::NotFound(format!("webhook event {}", id)))?
    };

    if event.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "webhook event {} is {} and cannot be retried",
            event.id, event.status
        )));
    }

    let status = reconcile::run_and_record(&state, &event).await?;
    Ok(Json(RetryResponse { id: event.id, status }))
}

/// Run a retry sweep on demand.
async fn trigger_sweep(State(state): State<AppState>) -> Result<Json<SweepStats>> {
    let stats = reconcile::sweep_due_events(&state).await?;
    Ok(Json(stats))
}
