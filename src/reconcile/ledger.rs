//! Subscription state transitions.
//!
//! State machine: `Pending -> Approved | Rejected | Cancelled`. Every
//! transition is a guarded compare-and-swap on the row's current status, so a
//! redelivered or concurrently-processed webhook observes `AlreadySettled`
//! instead of double-applying. The subscription row and the owning user's
//! premium flag are written together; callers run these inside one database
//! transaction so a crash between the two writes cannot grant premium access
//! without an approved subscription, or vice versa.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{PaymentStatus, Subscription};

/// Result of an approval attempt.
#[derive(Debug)]
pub enum ApproveOutcome {
    /// This call made the transition; commissions must now be allocated.
    Approved(Subscription),
    /// The row was already settled; nothing was written.
    AlreadySettled(PaymentStatus),
}

/// Result of a rejection attempt.
#[derive(Debug)]
pub enum RejectOutcome {
    /// This call made the transition; open commissions must now be reversed.
    Rejected,
    /// The row was already rejected or cancelled; nothing was written.
    AlreadySettled(PaymentStatus),
}

/// Approve a subscription: set `Approved`/`active`, stamp the billing period
/// from the plan, and grant the user's premium flag.
///
/// Idempotent: a row that is no longer `Pending` is reported as
/// `AlreadySettled` and left untouched. A `Rejected`/`Cancelled` row never
/// becomes `Approved`.
pub fn approve(conn: &Connection, sub: &Subscription, now: i64) -> Result<ApproveOutcome> {
    let period_start = now;
    let period_end = now + sub.plan.period_secs();

    if !queries::try_approve_subscription(conn, &sub.id, period_start, period_end, now)? {
        let current = queries::get_subscription_by_id(conn, &sub.id)?
            .ok_or_else(|| AppError::Internal(format!("subscription {} disappeared", sub.id)))?;
        tracing::debug!(
            "Approval no-op for subscription {}: already {}",
            sub.id,
            current.payment_status
        );
        return Ok(ApproveOutcome::AlreadySettled(current.payment_status));
    }

    queries::set_user_premium(conn, &sub.user_id, true, now)?;

    let mut approved = sub.clone();
    approved.payment_status = PaymentStatus::Approved;
    approved.period_start = Some(period_start);
    approved.period_end = Some(period_end);
    approved.active = true;
    approved.updated_at = now;

    tracing::info!(
        "Subscription {} approved: user={}, period_end={}",
        sub.id,
        sub.user_id,
        period_end
    );

    Ok(ApproveOutcome::Approved(approved))
}

/// Reject a subscription and revoke the user's premium flag.
///
/// Accepts `Pending` rows (ordinary decline) and `Approved` rows (chargeback).
/// Idempotent for rows already `Rejected`/`Cancelled`.
pub fn reject(conn: &Connection, sub: &Subscription, now: i64) -> Result<RejectOutcome> {
    if !queries::try_reject_subscription(conn, &sub.id, now)? {
        let current = queries::get_subscription_by_id(conn, &sub.id)?
            .ok_or_else(|| AppError::Internal(format!("subscription {} disappeared", sub.id)))?;
        tracing::debug!(
            "Rejection no-op for subscription {}: already {}",
            sub.id,
            current.payment_status
        );
        return Ok(RejectOutcome::AlreadySettled(current.payment_status));
    }

    queries::set_user_premium(conn, &sub.user_id, false, now)?;

    tracing::info!("Subscription {} rejected: user={}", sub.id, sub.user_id);

    Ok(RejectOutcome::Rejected)
}
