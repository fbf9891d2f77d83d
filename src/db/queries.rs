use rusqlite::{params, Connection};

use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    query_all, query_one, FromRow, COMMISSION_COLS, CONTENT_COLS, SUBSCRIPTION_COLS, USER_COLS,
    WEBHOOK_EVENT_COLS,
};

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser, now: i64) -> Result<User> {
    let id = EntityType::User.gen_id();
    let email = input.email.trim().to_lowercase();
    let commission_percent = input.commission_percent.unwrap_or(DEFAULT_COMMISSION_PERCENT);

    if !(0..=100).contains(&commission_percent) {
        return Err(AppError::BadRequest(format!(
            "commission_percent must be 0-100, got {}",
            commission_percent
        )));
    }

    conn.execute(
        "INSERT INTO users (id, email, name, is_creator, premium, commission_percent,
                            available_balance, lifetime_earned, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, 0, 0, ?6, ?6)",
        params![&id, &email, &input.name, input.is_creator, commission_percent, now],
    )?;

    Ok(User {
        id,
        email,
        name: input.name.clone(),
        is_creator: input.is_creator,
        premium: false,
        commission_percent,
        available_balance: 0,
        lifetime_earned: 0,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

/// Set the premium-access flag. Returns whether the row existed.
pub fn set_user_premium(conn: &Connection, user_id: &str, premium: bool, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET premium = ?1, updated_at = ?2 WHERE id = ?3",
        params![premium, now, user_id],
    )?;
    Ok(affected > 0)
}

/// Increment a creator's running balances. Must run inside the same database
/// transaction as the commission insert it accounts for.
pub fn credit_creator_balance(
    conn: &Connection,
    creator_id: &str,
    amount_minor: i64,
    now: i64,
) -> Result<()> {
    let affected = conn.execute(
        "UPDATE users
         SET available_balance = available_balance + ?1,
             lifetime_earned = lifetime_earned + ?1,
             updated_at = ?2
         WHERE id = ?3",
        params![amount_minor, now, creator_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(format!("creator {}", creator_id)));
    }
    Ok(())
}

/// Decrement a creator's running balances by a cancelled commission amount.
///
/// Guarded: returns `Ok(false)` when the decrement would take
/// `available_balance` negative, leaving the row untouched. The caller must
/// treat that as a data-integrity error, not clamp it.
pub fn try_debit_creator_balance(
    conn: &Connection,
    creator_id: &str,
    amount_minor: i64,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users
         SET available_balance = available_balance - ?1,
             lifetime_earned = lifetime_earned - ?1,
             updated_at = ?2
         WHERE id = ?3 AND available_balance >= ?1 AND lifetime_earned >= ?1",
        params![amount_minor, now, creator_id],
    )?;
    Ok(affected > 0)
}

// ============ Content ============

pub fn create_content(conn: &Connection, input: &CreateContent, now: i64) -> Result<Content> {
    let id = EntityType::Content.gen_id();
    conn.execute(
        "INSERT INTO content (id, creator_id, title, published_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, &input.creator_id, &input.title, input.published_at, now],
    )?;

    Ok(Content {
        id,
        creator_id: input.creator_id.clone(),
        title: input.title.clone(),
        published_at: input.published_at,
        created_at: now,
    })
}

pub fn get_content_by_id(conn: &Connection, id: &str) -> Result<Option<Content>> {
    query_one(
        conn,
        &format!("SELECT {} FROM content WHERE id = ?1", CONTENT_COLS),
        &[&id],
    )
}

/// Creators with at least one content item published at or after `since`,
/// ordered by id for a deterministic platform-wide split.
pub fn list_recently_active_creator_ids(conn: &Connection, since: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT u.id
         FROM users u
         JOIN content c ON c.creator_id = u.id
         WHERE u.is_creator = 1 AND c.published_at >= ?1
         ORDER BY u.id",
    )?;
    let ids = stmt
        .query_map(params![since], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

// ============ Subscriptions ============

pub fn create_subscription(
    conn: &Connection,
    transaction_ref: &str,
    input: &CreateSubscription,
    now: i64,
) -> Result<Subscription> {
    let id = EntityType::Subscription.gen_id();
    conn.execute(
        "INSERT INTO subscriptions (id, transaction_ref, user_id, content_id, plan,
                                    amount_minor, payment_status, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 0, ?7, ?7)",
        params![
            &id,
            transaction_ref,
            &input.user_id,
            &input.content_id,
            input.plan.as_ref(),
            input.amount_minor,
            now
        ],
    )?;

    Ok(Subscription {
        id,
        transaction_ref: transaction_ref.to_string(),
        user_id: input.user_id.clone(),
        content_id: input.content_id.clone(),
        plan: input.plan,
        amount_minor: input.amount_minor,
        payment_status: PaymentStatus::Pending,
        period_start: None,
        period_end: None,
        active: false,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_subscription_by_id(conn: &Connection, id: &str) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!("SELECT {} FROM subscriptions WHERE id = ?1", SUBSCRIPTION_COLS),
        &[&id],
    )
}

pub fn get_subscription_by_ref(
    conn: &Connection,
    transaction_ref: &str,
) -> Result<Option<Subscription>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM subscriptions WHERE transaction_ref = ?1",
            SUBSCRIPTION_COLS
        ),
        &[&transaction_ref],
    )
}

/// Atomically transition a subscription into `Approved`, returning whether
/// this call made the transition.
///
/// Compare-and-swap on the current status: a row that is no longer `Pending`
/// is left untouched and `Ok(false)` is returned, so concurrent deliveries of
/// the same approval can never double-apply.
pub fn try_approve_subscription(
    conn: &Connection,
    id: &str,
    period_start: i64,
    period_end: i64,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE subscriptions
         SET payment_status = 'approved', active = 1,
             period_start = ?1, period_end = ?2, updated_at = ?3
         WHERE id = ?4 AND payment_status = 'pending'",
        params![period_start, period_end, now, id],
    )?;
    Ok(affected > 0)
}

/// Atomically transition a subscription into `Rejected`.
///
/// Accepts `Pending` rows (ordinary decline) and `Approved` rows (chargeback);
/// a row already `Rejected`/`Cancelled` is left untouched and `Ok(false)` is
/// returned. The reverse direction is never permitted.
pub fn try_reject_subscription(conn: &Connection, id: &str, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE subscriptions
         SET payment_status = 'rejected', active = 0, updated_at = ?1
         WHERE id = ?2 AND payment_status IN ('pending', 'approved')",
        params![now, id],
    )?;
    Ok(affected > 0)
}

// ============ Webhook log ============

/// Atomically record an inbound webhook, returning true if this is a new
/// event. Returns false when the gateway redelivered an id we already hold.
///
/// Uses INSERT OR IGNORE so two concurrent deliveries of the same id race
/// safely: exactly one insert wins.
pub fn try_insert_webhook_event(
    conn: &Connection,
    id: &str,
    kind: WebhookKind,
    transaction_ref: &str,
    raw_payload: &str,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events
             (id, kind, transaction_ref, raw_payload, status, attempt, max_attempts, received_at)
         VALUES (?1, ?2, ?3, ?4, 'received', 0, ?5, ?6)",
        params![id, kind.as_ref(), transaction_ref, raw_payload, DEFAULT_MAX_ATTEMPTS, now],
    )?;
    Ok(affected > 0)
}

pub fn get_webhook_event(conn: &Connection, id: &str) -> Result<Option<WebhookEvent>> {
    query_one(
        conn,
        &format!("SELECT {} FROM webhook_events WHERE id = ?1", WEBHOOK_EVENT_COLS),
        &[&id],
    )
}

/// List webhook events for the operator surface, newest first.
pub fn list_webhook_events(
    conn: &Connection,
    filters: &WebhookEventFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<WebhookEvent>, i64)> {
    let mut clauses: Vec<&'static str> = Vec::new();
    let mut values: Vec<rusqlite::types::Value> = Vec::new();

    if let Some(status) = filters.status {
        clauses.push("status = ?");
        values.push(status.as_ref().to_string().into());
    }
    if let Some(kind) = filters.kind {
        clauses.push("kind = ?");
        values.push(kind.as_ref().to_string().into());
    }
    if let Some(ref transaction_ref) = filters.transaction_ref {
        clauses.push("transaction_ref = ?");
        values.push(transaction_ref.clone().into());
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM webhook_events {}", where_sql),
        rusqlite::params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    values.push(limit.into());
    values.push(offset.into());
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM webhook_events {} ORDER BY received_at DESC LIMIT ? OFFSET ?",
        WEBHOOK_EVENT_COLS, where_sql
    ))?;
    let items = stmt
        .query_map(rusqlite::params_from_iter(values.iter()), WebhookEvent::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((items, total))
}

/// Events eligible for the retry sweep: `pending_retry` with a due timestamp.
pub fn list_due_webhook_events(conn: &Connection, now: i64) -> Result<Vec<WebhookEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhook_events
             WHERE status = 'pending_retry' AND next_retry_at <= ?1
             ORDER BY next_retry_at ASC",
            WEBHOOK_EVENT_COLS
        ),
        &[&now],
    )
}

/// Mark an event terminal-processed. Terminal rows are never mutated again,
/// so the guard excludes them; returns whether the transition happened.
pub fn mark_webhook_processed(conn: &Connection, id: &str, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE webhook_events
         SET status = 'processed', processed_at = ?1, next_retry_at = NULL, last_error = NULL
         WHERE id = ?2 AND status NOT IN ('processed', 'failed')",
        params![now, id],
    )?;
    Ok(affected > 0)
}

/// Park an event for a later retry attempt.
pub fn mark_webhook_pending_retry(
    conn: &Connection,
    id: &str,
    attempt: i64,
    next_retry_at: i64,
    last_error: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE webhook_events
         SET status = 'pending_retry', attempt = ?1, next_retry_at = ?2, last_error = ?3
         WHERE id = ?4 AND status NOT IN ('processed', 'failed') AND attempt <= ?1",
        params![attempt, next_retry_at, last_error, id],
    )?;
    Ok(affected > 0)
}

/// Mark an event terminal-failed; it requires operator intervention from here.
pub fn mark_webhook_failed(
    conn: &Connection,
    id: &str,
    attempt: i64,
    last_error: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE webhook_events
         SET status = 'failed', attempt = ?1, next_retry_at = NULL, last_error = ?2
         WHERE id = ?3 AND status NOT IN ('processed', 'failed')",
        params![attempt, last_error, id],
    )?;
    Ok(affected > 0)
}

// ============ Commissions ============

#[allow(clippy::too_many_arguments)]
pub fn insert_commission(
    conn: &Connection,
    creator_id: &str,
    subscription_id: &str,
    content_id: Option<&str>,
    amount_minor: i64,
    applied_percent: i64,
    now: i64,
) -> Result<Commission> {
    let id = EntityType::Commission.gen_id();
    // Commissions vest immediately on approval: inserted straight into
    // 'available' with the vesting timestamp set.
    conn.execute(
        "INSERT INTO commissions (id, creator_id, subscription_id, content_id,
                                  amount_minor, applied_percent, status, generated_at, available_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'available', ?7, ?7)",
        params![&id, creator_id, subscription_id, content_id, amount_minor, applied_percent, now],
    )?;

    Ok(Commission {
        id,
        creator_id: creator_id.to_string(),
        subscription_id: subscription_id.to_string(),
        content_id: content_id.map(str::to_string),
        amount_minor,
        applied_percent,
        status: CommissionStatus::Available,
        generated_at: now,
        available_at: Some(now),
        paid_at: None,
    })
}

pub fn list_commissions_for_subscription(
    conn: &Connection,
    subscription_id: &str,
) -> Result<Vec<Commission>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM commissions WHERE subscription_id = ?1 ORDER BY generated_at, id",
            COMMISSION_COLS
        ),
        &[&subscription_id],
    )
}

/// Commissions still reversible: `pending` or `available`. `paid` rows belong
/// to the payout subsystem and are never cancelled here.
pub fn list_open_commissions_for_subscription(
    conn: &Connection,
    subscription_id: &str,
) -> Result<Vec<Commission>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM commissions
             WHERE subscription_id = ?1 AND status IN ('pending', 'available')
             ORDER BY generated_at, id",
            COMMISSION_COLS
        ),
        &[&subscription_id],
    )
}

pub fn list_commissions_for_creator(
    conn: &Connection,
    creator_id: &str,
) -> Result<Vec<Commission>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM commissions WHERE creator_id = ?1 ORDER BY generated_at, id",
            COMMISSION_COLS
        ),
        &[&creator_id],
    )
}

/// Cancel a single commission if it is still reversible.
pub fn try_cancel_commission(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE commissions SET status = 'cancelled'
         WHERE id = ?1 AND status IN ('pending', 'available')",
        params![id],
    )?;
    Ok(affected > 0)
}

/// Sum of commission amounts for one creator in one status. The balance
/// invariant check recomputes running balances from this.
pub fn sum_creator_commissions(
    conn: &Connection,
    creator_id: &str,
    status: CommissionStatus,
) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_minor), 0) FROM commissions
         WHERE creator_id = ?1 AND status = ?2",
        params![creator_id, status.as_ref()],
        |row| row.get(0),
    )?;
    Ok(total)
}
