//! Push stream and polling snapshot over the HTTP router

mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use common::TestApp;

/// Read body frames until one complete SSE event is buffered
async fn next_event(body: &mut Body, buffer: &mut String) -> Value {
    loop {
        if let Some(end) = buffer.find("\n\n") {
            let raw: String = buffer.drain(..end + 2).collect();
            let data: Vec<&str> = raw
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect();
            if data.is_empty() {
                continue;
            }
            return serde_json::from_str(&data.join("\n")).unwrap();
        }

        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("timed out waiting for stream event")
            .expect("stream ended")
            .unwrap();
        if let Ok(bytes) = frame.into_data() {
            buffer.push_str(std::str::from_utf8(&bytes).unwrap());
        }
    }
}

async fn open_stream(app: &TestApp, uri: &str, bearer: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    app.router()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_stream_requires_token() {
    let app = TestApp::new();

    let response = open_stream(&app, "/api/notifications/stream", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = open_stream(&app, "/api/notifications/stream?token=garbage", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stream_delivers_claim_to_creator() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;
    let id = app.create_order(&alice.token, "BUY").await;

    let response = open_stream(
        &app,
        &format!("/api/notifications/stream?token={}", alice.token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut body = response.into_body();
    let mut buffer = String::new();

    let connected = next_event(&mut body, &mut buffer).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["userId"], "100");
    assert!(app.state.hub.is_connected("100"));

    let (status, _) = app.act(&id, "claim", &bob.token).await;
    assert_eq!(status, StatusCode::OK);

    let event = next_event(&mut body, &mut buffer).await;
    assert_eq!(event["type"], "order_notification");
    assert_eq!(event["notificationType"], "order_claimed");
    assert_eq!(event["orderId"], id);
    assert_eq!(event["claimer"]["inGameName"], "Bob");
    assert!(event["id"].as_str().unwrap().starts_with(&format!("{}:order_claimed:", id)));

    drop(body);
    assert!(!app.state.hub.is_connected("100"));
}

#[tokio::test]
async fn test_new_orders_are_broadcast() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;

    let response = open_stream(&app, "/api/notifications/stream", Some(&bob.token)).await;
    let mut body = response.into_body();
    let mut buffer = String::new();
    next_event(&mut body, &mut buffer).await;

    let id = app.create_order(&alice.token, "SELL").await;

    let event = next_event(&mut body, &mut buffer).await;
    assert_eq!(event["notificationType"], "new_order_created");
    assert_eq!(event["orderId"], id);
    assert_eq!(event["orderDetails"]["orderType"], "SELL");
}

#[tokio::test]
async fn test_newer_stream_replaces_older() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;

    let first = open_stream(&app, "/api/notifications/stream", Some(&alice.token)).await;
    let mut first_body = first.into_body();
    let mut buffer = String::new();
    next_event(&mut first_body, &mut buffer).await;

    let second = open_stream(&app, "/api/notifications/stream", Some(&alice.token)).await;
    let mut second_body = second.into_body();
    let mut second_buffer = String::new();
    next_event(&mut second_body, &mut second_buffer).await;

    // The evicted stream going away must not remove the newer registration
    drop(first_body);
    assert!(app.state.hub.is_connected("100"));

    drop(second_body);
    assert!(!app.state.hub.is_connected("100"));
}

#[tokio::test]
async fn test_snapshot_lists_party_orders() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;
    let carol = app.user("300", Some("Carol")).await;

    let claimed = app.create_order(&alice.token, "BUY").await;
    app.create_order(&carol.token, "BUY").await;
    app.act(&claimed, "claim", &bob.token).await;

    let (status, orders) = app.get("/api/orders/notifications", &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], claimed);
    assert_eq!(orders[0]["status"], "IN_PROGRESS");

    let (_, orders) = app.get("/api/orders/notifications", &alice.token).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stream_keeps_no_cache_header() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;

    let response = open_stream(&app, "/api/notifications/stream", Some(&alice.token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CACHE_CONTROL).is_some());
}
