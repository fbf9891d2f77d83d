//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! This module provides a `FromRow` trait that models implement to define how
//! they are constructed from database rows, plus helper functions for common
//! query patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupted column values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, is_creator, premium, commission_percent, \
     available_balance, lifetime_earned, created_at, updated_at";

pub const CONTENT_COLS: &str = "id, creator_id, title, published_at, created_at";

pub const SUBSCRIPTION_COLS: &str = "id, transaction_ref, user_id, content_id, plan, \
     amount_minor, payment_status, period_start, period_end, active, created_at, updated_at";

pub const WEBHOOK_EVENT_COLS: &str = "id, kind, transaction_ref, raw_payload, status, \
     attempt, max_attempts, last_error, next_retry_at, processed_at, received_at";

pub const COMMISSION_COLS: &str = "id, creator_id, subscription_id, content_id, \
     amount_minor, applied_percent, status, generated_at, available_at, paid_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            is_creator: row.get(3)?,
            premium: row.get(4)?,
            commission_percent: row.get(5)?,
            available_balance: row.get(6)?,
            lifetime_earned: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Content {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Content {
            id: row.get(0)?,
            creator_id: row.get(1)?,
            title: row.get(2)?,
            published_at: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Subscription {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subscription {
            id: row.get(0)?,
            transaction_ref: row.get(1)?,
            user_id: row.get(2)?,
            content_id: row.get(3)?,
            plan: parse_enum(row, 4, "plan")?,
            amount_minor: row.get(5)?,
            payment_status: parse_enum(row, 6, "payment_status")?,
            period_start: row.get(7)?,
            period_end: row.get(8)?,
            active: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for WebhookEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WebhookEvent {
            id: row.get(0)?,
            kind: parse_enum(row, 1, "kind")?,
            transaction_ref: row.get(2)?,
            raw_payload: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            attempt: row.get(5)?,
            max_attempts: row.get(6)?,
            last_error: row.get(7)?,
            next_retry_at: row.get(8)?,
            processed_at: row.get(9)?,
            received_at: row.get(10)?,
        })
    }
}

impl FromRow for Commission {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Commission {
            id: row.get(0)?,
            creator_id: row.get(1)?,
            subscription_id: row.get(2)?,
            content_id: row.get(3)?,
            amount_minor: row.get(4)?,
            applied_percent: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            generated_at: row.get(7)?,
            available_at: row.get(8)?,
            paid_at: row.get(9)?,
        })
    }
}
