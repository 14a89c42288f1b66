//! Client consumer against a live server on a loopback port

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;
use farmy_fish_fry::client::{
    ConsumerConfig, NotificationConsumer, SnapshotPoller, StreamSubscriber, TracingSink,
    Visibility,
};
use farmy_fish_fry::models::notification::NotificationType;

async fn serve(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_push_and_poll_deliver_once() {
    let app = TestApp::new();
    let base_url = serve(&app).await;
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;
    let id = app.create_order(&alice.token, "BUY").await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = ConsumerConfig::new(&base_url, &alice.token, alice.user.id);
    config.store_path = dir.path().join("notifications.json");
    let consumer = NotificationConsumer::new(config, Arc::new(TracingSink), Visibility::new(true))
        .await
        .unwrap();

    // Seed the polling baseline while the order is still open
    let mut poller = SnapshotPoller::new(Arc::new(consumer.config().clone()), reqwest::Client::new());
    assert!(poller.poll_once().await.unwrap().is_empty());

    let subscriber = StreamSubscriber::new(consumer.clone(), reqwest::Client::new());
    let stream = tokio::spawn(async move { subscriber.connect_once().await });
    wait_for(|| {
        let hub = app.state.hub.clone();
        async move { hub.is_connected("100") }
    })
    .await;

    app.act(&id, "claim", &bob.token).await;

    let store = consumer.store();
    wait_for(|| {
        let store = store.clone();
        async move { store.lock().await.len() == 1 }
    })
    .await;

    // The poll sees the same change and produces the same id
    let polled = poller.poll_once().await.unwrap();
    assert_eq!(polled.len(), 1);
    assert_eq!(polled[0].notification_type, NotificationType::OrderClaimed);
    assert!(!consumer.ingest(polled[0].clone()).await.unwrap());

    {
        let store = store.lock().await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].id, polled[0].id);
        assert_eq!(store.items()[0].message, "Bob claimed your BUY order for 10x salt T2");
    }

    // Persisted to disk
    let saved = tokio::fs::read_to_string(dir.path().join("notifications.json"))
        .await
        .unwrap();
    assert!(saved.contains(&polled[0].id));

    stream.abort();
}

#[tokio::test]
async fn test_field_edit_after_push_does_not_duplicate() {
    let app = TestApp::new();
    let base_url = serve(&app).await;
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;
    let id = app.create_order(&alice.token, "BUY").await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = ConsumerConfig::new(&base_url, &alice.token, alice.user.id);
    config.store_path = dir.path().join("notifications.json");
    let consumer = NotificationConsumer::new(config, Arc::new(TracingSink), Visibility::new(true))
        .await
        .unwrap();

    let mut poller = SnapshotPoller::new(Arc::new(consumer.config().clone()), reqwest::Client::new());
    assert!(poller.poll_once().await.unwrap().is_empty());

    let subscriber = StreamSubscriber::new(consumer.clone(), reqwest::Client::new());
    let stream = tokio::spawn(async move { subscriber.connect_once().await });
    wait_for(|| {
        let hub = app.state.hub.clone();
        async move { hub.is_connected("100") }
    })
    .await;

    app.act(&id, "claim", &bob.token).await;
    let store = consumer.store();
    wait_for(|| {
        let store = store.clone();
        async move { store.lock().await.len() == 1 }
    })
    .await;

    // Amount change bumps updatedAt but not the status
    let (status, edited) = app
        .request(
            Method::PATCH,
            &format!("/api/orders/{}/edit", id),
            Some(&alice.token),
            Some(json!({ "amount": 12 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["status"], "IN_PROGRESS");

    let polled = poller.poll_once().await.unwrap();
    assert_eq!(polled.len(), 1);
    assert_eq!(polled[0].notification_type, NotificationType::OrderClaimed);
    assert!(!consumer.ingest(polled[0].clone()).await.unwrap());
    assert_eq!(store.lock().await.len(), 1);

    stream.abort();
}

#[tokio::test]
async fn test_poll_catches_changes_missed_while_offline() {
    let app = TestApp::new();
    let base_url = serve(&app).await;
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;
    let id = app.create_order(&alice.token, "BUY").await;
    app.act(&id, "claim", &bob.token).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = ConsumerConfig::new(&base_url, &alice.token, alice.user.id);
    config.store_path = dir.path().join("notifications.json");
    let consumer = NotificationConsumer::new(config, Arc::new(TracingSink), Visibility::new(true))
        .await
        .unwrap();

    let mut poller = SnapshotPoller::new(Arc::new(consumer.config().clone()), reqwest::Client::new());
    poller.poll_once().await.unwrap();

    // No push channel is open, so only polling can see these
    app.act(&id, "ready", &bob.token).await;
    let events = poller.poll_once().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].notification_type, NotificationType::OrderReady);
    assert!(consumer.ingest(events[0].clone()).await.unwrap());

    app.act(&id, "unclaim", &bob.token).await;
    let events = poller.poll_once().await.unwrap();
    assert_eq!(events[0].notification_type, NotificationType::OrderCancelled);

    // Claimer-side snapshots never synthesize creator notices
    let mut bob_poller = SnapshotPoller::new(
        Arc::new(ConsumerConfig::new(&base_url, &bob.token, bob.user.id)),
        reqwest::Client::new(),
    );
    bob_poller.poll_once().await.unwrap();
    app.act(&id, "claim", &bob.token).await;
    assert!(bob_poller.poll_once().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_spawned_consumer_reconnects_after_failure() {
    let app = TestApp::new();
    let base_url = serve(&app).await;
    let alice = app.user("100", Some("Alice")).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = ConsumerConfig::new(&base_url, &alice.token, alice.user.id);
    config.store_path = dir.path().join("notifications.json");
    config.reconnect_delay = Duration::from_millis(50);
    let consumer = NotificationConsumer::new(config, Arc::new(TracingSink), Visibility::new(true))
        .await
        .unwrap();

    let handle = consumer.spawn();
    wait_for(|| {
        let hub = app.state.hub.clone();
        async move { hub.is_connected("100") }
    })
    .await;

    // Server-side teardown ends the stream; the consumer comes back
    app.state.hub.shutdown();
    assert!(!app.state.hub.is_connected("100"));
    wait_for(|| {
        let hub = app.state.hub.clone();
        async move { hub.is_connected("100") }
    })
    .await;

    handle.shutdown();
}
