//! Retry scheduling: backoff bookkeeping, the bounded attempt cutoff, and
//! sweep behavior under a deterministic clock.

mod common;

use common::*;
use splitstream::reconcile::BACKOFF_SCHEDULE_SECS;

#[tokio::test]
async fn test_pending_gateway_parks_event_with_first_backoff() {
    let (state, gateway, _clock) = setup_test_state();

    let sub = {
        let conn = state.db.get().unwrap();
        let viewer = create_test_viewer(&conn, "fan@example.com");
        create_test_subscription(&conn, &viewer.id, None, 990)
    };

    gateway.set_status(&sub.transaction_ref, GatewayStatus::Pending);
    deliver_gateway_a(&state, "evt-pending", &sub.transaction_ref).await;

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "evt-pending").unwrap().unwrap();
    assert_eq!(event.status, WebhookStatus::PendingRetry);
    assert_eq!(event.attempt, 1);
    // Attempt 1 retries after exactly the first table delay
    assert_eq!(event.next_retry_at, Some(T0 + BACKOFF_SCHEDULE_SECS[0]));
    assert!(event.last_error.unwrap().contains("pending"));

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_pending_three_times_ends_failed() {
    let (state, gateway, clock) = setup_test_state();

    let sub = {
        let conn = state.db.get().unwrap();
        let viewer = create_test_viewer(&conn, "fan@example.com");
        create_test_subscription(&conn, &viewer.id, None, 990)
    };

    gateway.set_status(&sub.transaction_ref, GatewayStatus::Pending);

    // Attempt 1: synchronous with ingress
    deliver_gateway_a(&state, "evt-stuck", &sub.transaction_ref).await;

    // Attempt 2: first sweep once due
    clock.advance(BACKOFF_SCHEDULE_SECS[0]);
    let stats = reconcile::sweep_due_events(&state).await.unwrap();
    assert_eq!(stats.examined, 1);
    assert_eq!(stats.retried, 1);

    {
        let conn = state.db.get().unwrap();
        let event = queries::get_webhook_event(&conn, "evt-stuck").unwrap().unwrap();
        assert_eq!(event.attempt, 2);
        assert_eq!(
            event.next_retry_at,
            Some(clock.now() + BACKOFF_SCHEDULE_SECS[1])
        );
    }

    // Attempt 3: the bound - event fails, nothing further is scheduled
    clock.advance(BACKOFF_SCHEDULE_SECS[1]);
    let stats = reconcile::sweep_due_events(&state).await.unwrap();
    assert_eq!(stats.examined, 1);
    assert_eq!(stats.failed, 1);

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "evt-stuck").unwrap().unwrap();
    assert_eq!(event.status, WebhookStatus::Failed);
    assert_eq!(event.attempt, 3);
    assert!(event.next_retry_at.is_none());

    // The subscription never moved and no money moved
    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.payment_status, PaymentStatus::Pending);
    assert!(queries::list_commissions_for_subscription(&conn, &sub.id)
        .unwrap()
        .is_empty());
    // Release the pooled connection before the sweep acquires its own
    // (the test pool is capped at a single connection).
    drop(conn);

    // And a later sweep finds nothing to do
    clock.advance(BACKOFF_SCHEDULE_SECS[2]);
    let stats = reconcile::sweep_due_events(&state).await.unwrap();
    assert_eq!(stats.examined, 0);
}

#[tokio::test]
async fn test_sweep_ignores_events_not_yet_due() {
    let (state, gateway, clock) = setup_test_state();

    let sub = {
        let conn = state.db.get().unwrap();
        let viewer = create_test_viewer(&conn, "fan@example.com");
        create_test_subscription(&conn, &viewer.id, None, 990)
    };

    gateway.set_status(&sub.transaction_ref, GatewayStatus::Pending);
    deliver_gateway_a(&state, "evt-early", &sub.transaction_ref).await;

    // One second short of the backoff deadline
    clock.advance(BACKOFF_SCHEDULE_SECS[0] - 1);
    let stats = reconcile::sweep_due_events(&state).await.unwrap();
    assert_eq!(stats.examined, 0);

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "evt-early").unwrap().unwrap();
    assert_eq!(event.status, WebhookStatus::PendingRetry);
    assert_eq!(event.attempt, 1);
}

#[tokio::test]
async fn test_sweep_recovers_after_gateway_outage() {
    let (state, gateway, clock) = setup_test_state();

    let (creator, sub) = {
        let conn = state.db.get().unwrap();
        let creator = create_test_creator(&conn, "maker@example.com", 70);
        let content = create_test_content(&conn, &creator.id, T0);
        let viewer = create_test_viewer(&conn, "fan@example.com");
        let sub = create_test_subscription(&conn, &viewer.id, Some(&content.id), 1000);
        (creator, sub)
    };

    // Gateway unreachable on the synchronous attempt
    gateway.set_down(true);
    deliver_gateway_a(&state, "evt-outage", &sub.transaction_ref).await;

    {
        let conn = state.db.get().unwrap();
        let event = queries::get_webhook_event(&conn, "evt-outage").unwrap().unwrap();
        assert_eq!(event.status, WebhookStatus::PendingRetry);
        assert!(event.last_error.unwrap().contains("timed out"));
    }

    // Gateway back up by the time the retry is due
    gateway.set_down(false);
    gateway.set_status(&sub.transaction_ref, GatewayStatus::Approved);
    clock.advance(BACKOFF_SCHEDULE_SECS[0]);

    let stats = reconcile::sweep_due_events(&state).await.unwrap();
    assert_eq!(stats.processed, 1);

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "evt-outage").unwrap().unwrap();
    assert_eq!(event.status, WebhookStatus::Processed);

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.payment_status, PaymentStatus::Approved);

    let creator = queries::get_user_by_id(&conn, &creator.id).unwrap().unwrap();
    assert_eq!(creator.available_balance, 700);
    assert_balance_invariant(&conn, &creator.id);
}

#[tokio::test]
async fn test_redelivery_while_pending_retry_reprocesses() {
    let (state, gateway, _clock) = setup_test_state();

    let sub = {
        let conn = state.db.get().unwrap();
        let viewer = create_test_viewer(&conn, "fan@example.com");
        create_test_subscription(&conn, &viewer.id, None, 990)
    };

    gateway.set_status(&sub.transaction_ref, GatewayStatus::Pending);
    deliver_gateway_a(&state, "evt-redeliver", &sub.transaction_ref).await;

    // The gateway settles, then redelivers the same notification id before
    // our own retry fires. The redelivery is a free retry.
    gateway.set_status(&sub.transaction_ref, GatewayStatus::Approved);
    deliver_gateway_a(&state, "evt-redeliver", &sub.transaction_ref).await;

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "evt-redeliver").unwrap().unwrap();
    assert_eq!(event.status, WebhookStatus::Processed);

    let sub = queries::get_subscription_by_id(&conn, &sub.id).unwrap().unwrap();
    assert_eq!(sub.payment_status, PaymentStatus::Approved);
}

#[test]
fn test_terminal_rows_are_never_mutated() {
    let conn = setup_test_db();

    queries::try_insert_webhook_event(&conn, "evt-term", WebhookKind::GatewayA, "ss_txr_x", "{}", T0)
        .unwrap();
    assert!(queries::mark_webhook_processed(&conn, "evt-term", T0).unwrap());

    // All further transitions must bounce off the terminal row
    assert!(!queries::mark_webhook_pending_retry(&conn, "evt-term", 1, T0 + 60, "late").unwrap());
    assert!(!queries::mark_webhook_failed(&conn, "evt-term", 1, "late").unwrap());
    assert!(!queries::mark_webhook_processed(&conn, "evt-term", T0 + 1).unwrap());

    let event = queries::get_webhook_event(&conn, "evt-term").unwrap().unwrap();
    assert_eq!(event.status, WebhookStatus::Processed);
    assert_eq!(event.processed_at, Some(T0));
    assert_eq!(event.attempt, 0);
    assert!(event.last_error.is_none());
}

#[test]
fn test_attempt_only_increases() {
    let conn = setup_test_db();

    queries::try_insert_webhook_event(&conn, "evt-mono", WebhookKind::GatewayA, "ss_txr_x", "{}", T0)
        .unwrap();
    assert!(queries::mark_webhook_pending_retry(&conn, "evt-mono", 2, T0 + 300, "slow").unwrap());

    // A stale writer cannot move the attempt counter backwards
    assert!(!queries::mark_webhook_pending_retry(&conn, "evt-mono", 1, T0 + 60, "stale").unwrap());

    let event = queries::get_webhook_event(&conn, "evt-mono").unwrap().unwrap();
    assert_eq!(event.attempt, 2);
}
