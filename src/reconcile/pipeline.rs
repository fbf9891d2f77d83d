//! Per-webhook reconciliation pipeline.
//!
//! Sequence: resolve the authoritative gateway status for the event's
//! transaction reference, transition the subscription ledger, allocate or
//! reverse commissions on fresh transitions only. Every failure is caught
//! here and classified; callers receive an [`Outcome`], never an error.

use rusqlite::Connection;

use crate::db::{queries, AppState};
use crate::error::AppError;
use crate::gateway::GatewayStatus;
use crate::models::{Subscription, WebhookEvent, WebhookStatus};

use super::retry;
use super::{allocator, ledger};

/// Classified result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Terminal success; the event will never be re-driven.
    Processed,
    /// Worth retrying with backoff: storage unavailable, gateway timeout, or
    /// the gateway still reports the payment as pending.
    Transient(String),
    /// Retrying cannot help: unknown transaction reference or a
    /// data-integrity violation. Requires operator intervention.
    Permanent(String),
}

/// Run the pipeline for one webhook event.
pub async fn run(state: &AppState, event: &WebhookEvent) -> Outcome {
    let status = match state.gateway.status(&event.transaction_ref).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(
                "Gateway lookup failed for event {} (ref {}): {}",
                event.id,
                event.transaction_ref,
                e
            );
            return Outcome::Transient(format!("gateway lookup failed: {}", e));
        }
    };

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return Outcome::Transient(format!("database pool unavailable: {}", e)),
    };

    let sub = match queries::get_subscription_by_ref(&conn, &event.transaction_ref) {
        Ok(Some(s)) => s,
        Ok(None) => {
            // Nothing to reconcile against; redelivery cannot change that.
            return Outcome::Permanent(format!(
                "no subscription for transaction reference {}",
                event.transaction_ref
            ));
        }
        Err(e) => return Outcome::Transient(format!("subscription lookup failed: {}", e)),
    };

    let now = state.clock.now();
    let result = match status {
        GatewayStatus::Pending => {
            tracing::debug!(
                "Gateway still pending for event {} (ref {})",
                event.id,
                event.transaction_ref
            );
            return Outcome::Transient("gateway reports payment pending".to_string());
        }
        GatewayStatus::Approved => apply_approval(&mut conn, &sub, now),
        GatewayStatus::Rejected => apply_rejection(&mut conn, &sub, now),
    };

    match result {
        Ok(()) => Outcome::Processed,
        Err(AppError::Integrity(msg)) => Outcome::Permanent(msg),
        Err(e) => Outcome::Transient(e.to_string()),
    }
}

/// Approve the subscription and, only on a fresh transition, allocate
/// commissions - one atomic unit of work.
fn apply_approval(
    conn: &mut Connection,
    sub: &Subscription,
    now: i64,
) -> crate::error::Result<()> {
    let tx = conn.transaction()?;

    match ledger::approve(&tx, sub, now)? {
        ledger::ApproveOutcome::Approved(approved) => {
            allocator::allocate(&tx, &approved, now)?;
        }
        ledger::ApproveOutcome::AlreadySettled(_) => {
            // Duplicate or out-of-order delivery; nothing to allocate.
        }
    }

    tx.commit()?;
    Ok(())
}

/// Reject the subscription and, only on a fresh transition, reverse any open
/// commissions - one atomic unit of work.
fn apply_rejection(
    conn: &mut Connection,
    sub: &Subscription,
    now: i64,
) -> crate::error::Result<()> {
    let tx = conn.transaction()?;

    match ledger::reject(&tx, sub, now)? {
        ledger::RejectOutcome::Rejected => {
            allocator::reverse(&tx, sub, now)?;
        }
        ledger::RejectOutcome::AlreadySettled(_) => {}
    }

    tx.commit()?;
    Ok(())
}

/// Run the pipeline and persist the resulting webhook-log transition.
///
/// This is the one entry point shared by the ingress, the retry sweep, and
/// the operator's forced retry.
pub async fn run_and_record(
    state: &AppState,
    event: &WebhookEvent,
) -> crate::error::Result<WebhookStatus> {
    let outcome = run(state, event).await;
    let conn = state.db.get()?;
    retry::record_outcome(&conn, event, &outcome, state.clock.now())
}
