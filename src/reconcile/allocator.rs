//! Commission allocation and reversal.
//!
//! Invoked only on fresh ledger transitions, inside the same database
//! transaction, so the commission rows and the creator balance updates land
//! atomically with the subscription write.
//!
//! Conservation: for one payment of amount A, the sum of all commission
//! amounts never exceeds A. Integer flooring remainders are retained by the
//! platform - never silently dropped onto a creator, never double-paid.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{Commission, Subscription};
use crate::util::SECONDS_PER_DAY;

/// Trailing window that defines "recently active" creators for the
/// platform-wide split: at least one content item published in this window.
pub const ACTIVE_CREATOR_WINDOW_SECS: i64 = 30 * SECONDS_PER_DAY;

/// `floor(base * percent / 100)` in minor units. Non-negative inputs only.
pub fn commission_amount(base_minor: i64, percent: i64) -> i64 {
    base_minor * percent / 100
}

/// Allocate commissions for a freshly-approved subscription.
///
/// A content-bound subscription credits that content's creator with their
/// full share. A platform-wide subscription splits the amount equally
/// (integer division) across recently active creators, each slice subject to
/// that creator's own commission percent. Creator balances are incremented
/// alongside each insert; commissions vest immediately.
pub fn allocate(conn: &Connection, sub: &Subscription, now: i64) -> Result<Vec<Commission>> {
    match &sub.content_id {
        Some(content_id) => allocate_for_content(conn, sub, content_id, now),
        None => allocate_platform_wide(conn, sub, now),
    }
}

fn allocate_for_content(
    conn: &Connection,
    sub: &Subscription,
    content_id: &str,
    now: i64,
) -> Result<Vec<Commission>> {
    let content = queries::get_content_by_id(conn, content_id)?
        .ok_or_else(|| AppError::NotFound(format!("content {}", content_id)))?;
    let creator = queries::get_user_by_id(conn, &content.creator_id)?
        .ok_or_else(|| AppError::NotFound(format!("creator {}", content.creator_id)))?;

    let amount = commission_amount(sub.amount_minor, creator.commission_percent);
    if amount == 0 {
        return Ok(Vec::new());
    }

    let commission = credit(
        conn,
        &creator.id,
        sub,
        Some(content_id),
        amount,
        creator.commission_percent,
        now,
    )?;

    Ok(vec![commission])
}

fn allocate_platform_wide(
    conn: &Connection,
    sub: &Subscription,
    now: i64,
) -> Result<Vec<Commission>> {
    let since = now - ACTIVE_CREATOR_WINDOW_SECS;
    let creator_ids = queries::list_recently_active_creator_ids(conn, since)?;

    if creator_ids.is_empty() {
        tracing::info!(
            "No recently active creators for platform subscription {}; platform retains {}",
            sub.id,
            sub.amount_minor
        );
        return Ok(Vec::new());
    }

    // Equal integer split; the division remainder stays with the platform.
    let slice = sub.amount_minor / creator_ids.len() as i64;

    let mut commissions = Vec::with_capacity(creator_ids.len());
    for creator_id in &creator_ids {
        let creator = queries::get_user_by_id(conn, creator_id)?
            .ok_or_else(|| AppError::NotFound(format!("creator {}", creator_id)))?;

        let amount = commission_amount(slice, creator.commission_percent);
        if amount == 0 {
            continue;
        }

        commissions.push(credit(
            conn,
            creator_id,
            sub,
            None,
            amount,
            creator.commission_percent,
            now,
        )?);
    }

    Ok(commissions)
}

fn credit(
    conn: &Connection,
    creator_id: &str,
    sub: &Subscription,
    content_id: Option<&str>,
    amount_minor: i64,
    applied_percent: i64,
    now: i64,
) -> Result<Commission> {
    let commission = queries::insert_commission(
        conn,
        creator_id,
        &sub.id,
        content_id,
        amount_minor,
        applied_percent,
        now,
    )?;
    queries::credit_creator_balance(conn, creator_id, amount_minor, now)?;

    tracing::info!(
        "Commission {} allocated: creator={}, subscription={}, amount={} ({}%)",
        commission.id,
        creator_id,
        sub.id,
        amount_minor,
        applied_percent
    );

    Ok(commission)
}

/// Reverse a rejected/charged-back subscription's commissions.
///
/// Cancels only `Pending`/`Available` rows - `Paid` commissions belong to the
/// payout subsystem and are untouchable here - and decrements each creator's
/// balances by exactly the cancelled amount. A decrement that would go
/// negative means the ledger and the running balances have drifted apart;
/// that is surfaced as an integrity error, never clamped.
pub fn reverse(conn: &Connection, sub: &Subscription, now: i64) -> Result<i64> {
    let open = queries::list_open_commissions_for_subscription(conn, &sub.id)?;

    let mut reversed_total = 0;
    for commission in &open {
        if !queries::try_cancel_commission(conn, &commission.id)? {
            // Lost a race against another transition for this row; skip it.
            continue;
        }

        if !queries::try_debit_creator_balance(
            conn,
            &commission.creator_id,
            commission.amount_minor,
            now,
        )? {
            return Err(AppError::Integrity(format!(
                "cancelling commission {} would drive creator {} balance negative",
                commission.id, commission.creator_id
            )));
        }

        reversed_total += commission.amount_minor;
    }

    if reversed_total > 0 {
        tracing::info!(
            "Reversed {} in commissions for subscription {}",
            reversed_total,
            sub.id
        );
    }

    Ok(reversed_total)
}
