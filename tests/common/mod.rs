//! Test utilities and fixtures for Splitstream integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use splitstream::clock::Clock;
pub use splitstream::db::{init_db, queries, AppState};
pub use splitstream::gateway::{GatewayError, GatewayStatus, PaymentGatewayClient};
pub use splitstream::id::EntityType;
pub use splitstream::models::*;
pub use splitstream::reconcile;

/// Deterministic clock for driving backoff schedules from tests.
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Scripted gateway: per-reference statuses, plus a switch that simulates an
/// outage (every lookup times out while it is on).
#[derive(Default)]
pub struct FakeGateway {
    statuses: Mutex<HashMap<String, GatewayStatus>>,
    down: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, transaction_ref: &str, status: GatewayStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(transaction_ref.to_string(), status);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

impl PaymentGatewayClient for FakeGateway {
    fn status<'a>(
        &'a self,
        transaction_ref: &'a str,
    ) -> BoxFuture<'a, Result<GatewayStatus, GatewayError>> {
        Box::pin(async move {
            if self.down.load(Ordering::SeqCst) {
                return Err(GatewayError::Timeout);
            }
            self.statuses
                .lock()
                .unwrap()
                .get(transaction_ref)
                .copied()
                .ok_or_else(|| {
                    GatewayError::InvalidResponse(format!(
                        "no scripted status for {}",
                        transaction_ref
                    ))
                })
        })
    }
}

/// Epoch base for fixed clocks; any stable value works.
pub const T0: i64 = 1_700_000_000;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Build an AppState over a single shared in-memory connection, plus handles
/// to the scripted gateway and clock.
///
/// The pool is capped at one connection (an in-memory SQLite database exists
/// per connection); tests must not hold a pooled connection across calls that
/// acquire their own.
pub fn setup_test_state() -> (AppState, Arc<FakeGateway>, Arc<FixedClock>) {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("Failed to create test pool");
    {
        let conn = pool.get().expect("Failed to get test connection");
        init_db(&conn).expect("Failed to initialize schema");
    }

    let gateway = Arc::new(FakeGateway::new());
    let clock = Arc::new(FixedClock::new(T0));

    let state = AppState {
        db: pool,
        gateway: gateway.clone(),
        clock: clock.clone(),
        sweep_lock: Arc::new(tokio::sync::Mutex::new(())),
        operator_api_key: Some("test-operator-key".to_string()),
    };

    (state, gateway, clock)
}

/// Create a test creator with the given revenue-share percent
pub fn create_test_creator(conn: &Connection, email: &str, commission_percent: i64) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Creator {}", email),
            is_creator: true,
            commission_percent: Some(commission_percent),
        },
        T0,
    )
    .expect("Failed to create test creator")
}

/// Create a test viewer (non-creator account)
pub fn create_test_viewer(conn: &Connection, email: &str) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Viewer {}", email),
            is_creator: false,
            commission_percent: None,
        },
        T0,
    )
    .expect("Failed to create test viewer")
}

/// Create a test content item for a creator
pub fn create_test_content(conn: &Connection, creator_id: &str, published_at: i64) -> Content {
    queries::create_content(
        conn,
        &CreateContent {
            creator_id: creator_id.to_string(),
            title: format!("Content by {}", creator_id),
            published_at,
        },
        T0,
    )
    .expect("Failed to create test content")
}

/// Create a pending test subscription with a fresh transaction reference
pub fn create_test_subscription(
    conn: &Connection,
    user_id: &str,
    content_id: Option<&str>,
    amount_minor: i64,
) -> Subscription {
    let transaction_ref = EntityType::TransactionRef.gen_id();
    queries::create_subscription(
        conn,
        &transaction_ref,
        &CreateSubscription {
            user_id: user_id.to_string(),
            content_id: content_id.map(str::to_string),
            plan: Plan::Monthly,
            amount_minor,
        },
        T0,
    )
    .expect("Failed to create test subscription")
}

/// Deliver a Gateway A webhook body through the ingress path.
pub async fn deliver_gateway_a(state: &AppState, event_id: &str, transaction_ref: &str) {
    use splitstream::handlers::webhooks::gateway_a::gateway_a_ack;

    let body = serde_json::json!({
        "id": event_id,
        "event": "payment.updated",
        "transaction_ref": transaction_ref,
    });
    let bytes = axum::body::Bytes::from(body.to_string());
    let (status, _) = gateway_a_ack(state, &bytes).await;
    assert_eq!(status, axum::http::StatusCode::OK, "ingress must always ack");
}

/// Assert that a creator's running balances equal the sums recomputed from
/// their commission ledger.
pub fn assert_balance_invariant(conn: &Connection, creator_id: &str) {
    let user = queries::get_user_by_id(conn, creator_id)
        .expect("Failed to load creator")
        .expect("Creator not found");

    let available = queries::sum_creator_commissions(conn, creator_id, CommissionStatus::Available)
        .expect("Failed to sum available commissions");
    let paid = queries::sum_creator_commissions(conn, creator_id, CommissionStatus::Paid)
        .expect("Failed to sum paid commissions");

    assert_eq!(
        user.available_balance, available,
        "available_balance drifted from the commission ledger for {}",
        creator_id
    );
    assert_eq!(
        user.lifetime_earned,
        available + paid,
        "lifetime_earned drifted from the commission ledger for {}",
        creator_id
    );
}
