//! Retry scheduling for failed reconciliation attempts.
//!
//! Split into a pure transition function and the code that executes it: given
//! an event and a pipeline outcome, [`plan_disposition`] decides the next
//! webhook-log state with no clock or I/O of its own, and
//! [`record_outcome`] persists that decision through the guarded log-store
//! updates. The periodic [`sweep_due_events`] re-drives everything due, at
//! most once at a time.

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::models::{WebhookEvent, WebhookStatus};

use super::pipeline::{self, Outcome};

/// Fixed backoff table, seconds, indexed by completed attempt count:
/// 1, 5, 15 minutes.
pub const BACKOFF_SCHEDULE_SECS: [i64; 3] = [60, 300, 900];

/// Delay before the next retry after `attempt` completed attempts.
/// Attempts beyond the table reuse its last entry.
pub fn backoff_delay_secs(attempt: i64) -> i64 {
    let idx = (attempt.max(1) as usize - 1).min(BACKOFF_SCHEDULE_SECS.len() - 1);
    BACKOFF_SCHEDULE_SECS[idx]
}

/// Next webhook-log state decided from one pipeline outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Processed,
    Retry { attempt: i64, next_retry_at: i64 },
    Failed { attempt: i64, reason: String },
}

/// Pure transition function for the webhook-log state machine.
///
/// - Success is terminal.
/// - A permanent error fails the event immediately; no attempts are spent
///   waiting on something redelivery cannot fix.
/// - A transient error consumes one attempt; under the bound it parks the
///   event with the table backoff, at the bound it fails the event.
pub fn plan_disposition(event: &WebhookEvent, outcome: &Outcome, now: i64) -> Disposition {
    match outcome {
        Outcome::Processed => Disposition::Processed,
        Outcome::Permanent(reason) => Disposition::Failed {
            attempt: event.attempt + 1,
            reason: reason.clone(),
        },
        Outcome::Transient(reason) => {
            let attempt = event.attempt + 1;
            if attempt >= event.max_attempts {
                Disposition::Failed {
                    attempt,
                    reason: format!("retries exhausted: {}", reason),
                }
            } else {
                Disposition::Retry {
                    attempt,
                    next_retry_at: now + backoff_delay_secs(attempt),
                }
            }
        }
    }
}

/// Persist a pipeline outcome to the webhook log and return the new status.
pub fn record_outcome(
    conn: &rusqlite::Connection,
    event: &WebhookEvent,
    outcome: &Outcome,
    now: i64,
) -> Result<WebhookStatus> {
    match plan_disposition(event, outcome, now) {
        Disposition::Processed => {
            queries::mark_webhook_processed(conn, &event.id, now)?;
            tracing::info!("Webhook event {} processed", event.id);
            Ok(WebhookStatus::Processed)
        }
        Disposition::Retry {
            attempt,
            next_retry_at,
        } => {
            let reason = match outcome {
                Outcome::Transient(r) => r.as_str(),
                _ => "",
            };
            queries::mark_webhook_pending_retry(conn, &event.id, attempt, next_retry_at, reason)?;
            tracing::warn!(
                "Webhook event {} parked for retry: attempt={}, next_retry_at={}, reason={}",
                event.id,
                attempt,
                next_retry_at,
                reason
            );
            Ok(WebhookStatus::PendingRetry)
        }
        Disposition::Failed { attempt, reason } => {
            queries::mark_webhook_failed(conn, &event.id, attempt, &reason)?;
            tracing::error!(
                "Webhook event {} failed permanently after {} attempt(s): {}",
                event.id,
                attempt,
                reason
            );
            Ok(WebhookStatus::Failed)
        }
    }
}

/// Counters from one retry sweep.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct SweepStats {
    pub examined: usize,
    pub processed: usize,
    pub retried: usize,
    pub failed: usize,
    /// True when another sweep held the single-flight lock
    pub skipped: bool,
}

/// Re-drive every due `pending_retry` event through the pipeline.
///
/// Single-flight: if a sweep is already running, this returns immediately
/// with `skipped` set. A sweep racing a fresh inbound webhook for the same
/// transaction is safe - every ledger/allocator write is a guarded
/// conditional transition.
pub async fn sweep_due_events(state: &AppState) -> Result<SweepStats> {
    let Ok(_guard) = state.sweep_lock.try_lock() else {
        tracing::debug!("Sweep already in flight, skipping");
        return Ok(SweepStats {
            skipped: true,
            ..Default::default()
        });
    };

    let due = {
        let conn = state.db.get()?;
        queries::list_due_webhook_events(&conn, state.clock.now())?
    };

    let mut stats = SweepStats {
        examined: due.len(),
        ..Default::default()
    };

    for event in &due {
        match pipeline::run_and_record(state, event).await {
            Ok(WebhookStatus::Processed) => stats.processed += 1,
            Ok(WebhookStatus::PendingRetry) => stats.retried += 1,
            Ok(WebhookStatus::Failed) => stats.failed += 1,
            Ok(_) => {}
            Err(e) => {
                // Bookkeeping failed; the event stays due and the next sweep
                // picks it up again.
                tracing::error!("Failed to record outcome for event {}: {}", event.id, e);
            }
        }
    }

    if stats.examined > 0 {
        tracing::info!(
            "Sweep complete: examined={}, processed={}, retried={}, failed={}",
            stats.examined,
            stats.processed,
            stats.retried,
            stats.failed
        );
    }

    Ok(stats)
}
