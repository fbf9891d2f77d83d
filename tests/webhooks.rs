//! Ingress contract tests: the gateway always gets a 200, whatever happens
//! inside, and both gateway envelope shapes land in the webhook log.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use tower::ServiceExt;

fn webhook_request(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_malformed_body_is_acknowledged_and_not_logged() {
    let (state, _gateway, _clock) = setup_test_state();
    let app = splitstream::handlers::webhooks::router().with_state(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/gateway-a")
                .header("content-type", "application/json")
                .body(Body::from("this is not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    // A parse mismatch must never look like a delivery failure to the gateway
    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let (events, total) =
        queries::list_webhook_events(&conn, &WebhookEventFilters::default(), 50, 0).unwrap();
    assert_eq!(total, 0);
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_missing_fields_are_acknowledged_and_not_logged() {
    let (state, _gateway, _clock) = setup_test_state();
    let app = splitstream::handlers::webhooks::router().with_state(state.clone());

    let response = app
        .oneshot(webhook_request(
            "/webhooks/gateway-a",
            serde_json::json!({"id": "evt-1", "event": "payment.updated"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let (_, total) =
        queries::list_webhook_events(&conn, &WebhookEventFilters::default(), 50, 0).unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_gateway_a_envelope_is_logged_with_kind() {
    let (state, gateway, _clock) = setup_test_state();

    let sub = {
        let conn = state.db.get().unwrap();
        let viewer = create_test_viewer(&conn, "fan@example.com");
        create_test_subscription(&conn, &viewer.id, None, 990)
    };
    gateway.set_status(&sub.transaction_ref, GatewayStatus::Approved);

    let app = splitstream::handlers::webhooks::router().with_state(state.clone());
    let response = app
        .oneshot(webhook_request(
            "/webhooks/gateway-a",
            serde_json::json!({
                "id": "evt-a-1",
                "event": "payment.approved",
                "transaction_ref": sub.transaction_ref,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "evt-a-1").unwrap().unwrap();
    assert_eq!(event.kind, WebhookKind::GatewayA);
    assert_eq!(event.transaction_ref, sub.transaction_ref);
    assert_eq!(event.status, WebhookStatus::Processed);
    // Raw payload is preserved verbatim for replay/audit
    assert!(event.raw_payload.contains("payment.approved"));
}

#[tokio::test]
async fn test_gateway_b_envelope_is_logged_with_kind() {
    let (state, gateway, _clock) = setup_test_state();

    let sub = {
        let conn = state.db.get().unwrap();
        let viewer = create_test_viewer(&conn, "fan@example.com");
        create_test_subscription(&conn, &viewer.id, None, 990)
    };
    gateway.set_status(&sub.transaction_ref, GatewayStatus::Approved);

    let app = splitstream::handlers::webhooks::router().with_state(state.clone());
    let response = app
        .oneshot(webhook_request(
            "/webhooks/gateway-b",
            serde_json::json!({
                "notification_id": "n-b-1",
                "action": "charge.settled",
                "data": {"reference": sub.transaction_ref},
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "n-b-1").unwrap().unwrap();
    assert_eq!(event.kind, WebhookKind::GatewayB);
    assert_eq!(event.status, WebhookStatus::Processed);
}

#[tokio::test]
async fn test_internal_failure_still_acks_200() {
    let (state, gateway, _clock) = setup_test_state();

    // No subscription exists for this reference: a permanent internal failure
    gateway.set_status("ss_txr_unknown", GatewayStatus::Approved);

    let app = splitstream::handlers::webhooks::router().with_state(state.clone());
    let response = app
        .oneshot(webhook_request(
            "/webhooks/gateway-a",
            serde_json::json!({
                "id": "evt-doomed",
                "event": "payment.approved",
                "transaction_ref": "ss_txr_unknown",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "evt-doomed").unwrap().unwrap();
    assert_eq!(event.status, WebhookStatus::Failed);
}

#[tokio::test]
async fn test_terminal_duplicate_does_not_rerun_pipeline() {
    let (state, gateway, _clock) = setup_test_state();

    let sub = {
        let conn = state.db.get().unwrap();
        let viewer = create_test_viewer(&conn, "fan@example.com");
        create_test_subscription(&conn, &viewer.id, None, 990)
    };
    gateway.set_status(&sub.transaction_ref, GatewayStatus::Approved);

    deliver_gateway_a(&state, "evt-once", &sub.transaction_ref).await;

    // Gateway goes down; the redelivered duplicate must not care, because the
    // terminal row short-circuits before any gateway lookup
    gateway.set_down(true);
    deliver_gateway_a(&state, "evt-once", &sub.transaction_ref).await;

    let conn = state.db.get().unwrap();
    let event = queries::get_webhook_event(&conn, "evt-once").unwrap().unwrap();
    assert_eq!(event.status, WebhookStatus::Processed);
    assert_eq!(event.attempt, 0, "duplicate must not consume attempts");
}
