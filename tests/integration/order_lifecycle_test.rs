//! End-to-end order lifecycle over the HTTP router

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;
use farmy_fish_fry::models::notification::{NotificationType, StreamMessage};

fn notification_type(message: StreamMessage) -> NotificationType {
    match message {
        StreamMessage::OrderNotification(event) => event.notification_type,
        other => panic!("expected order notification, got {:?}", other),
    }
}

#[tokio::test]
async fn test_buy_order_full_lifecycle() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;

    // Created
    let id = app.create_order(&alice.token, "BUY").await;
    let (status, order) = app.get(&format!("/api/orders/{}", id), &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "OPEN");
    assert_eq!(order["itemName"], "salt");
    assert_eq!(order["creatorId"], alice.user.id.to_string());
    assert!(order["claimerId"].is_null());

    let mut alice_rx = app.state.hub.register(&alice.user.discord_id).rx;

    // Claimed
    let (status, order) = app.act(&id, "claim", &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "IN_PROGRESS");
    assert_eq!(order["claimerId"], bob.user.id.to_string());
    match alice_rx.try_recv().unwrap() {
        StreamMessage::OrderNotification(event) => {
            assert_eq!(event.notification_type, NotificationType::OrderClaimed);
            assert!(event.message.contains("Bob"), "{}", event.message);
        }
        other => panic!("unexpected {:?}", other),
    }

    // Completing a BUY order before it is ready fails
    let (status, _) = app.act(&id, "complete", &alice.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Ready
    let (status, order) = app.act(&id, "ready", &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "READY_TO_TRADE");
    assert_eq!(
        notification_type(alice_rx.try_recv().unwrap()),
        NotificationType::OrderReady
    );

    // Completed
    let (status, order) = app.act(&id, "complete", &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "FULFILLED");
    assert!(!order["fulfilledAt"].is_null());
    assert_eq!(
        notification_type(alice_rx.try_recv().unwrap()),
        NotificationType::OrderCompleted
    );
    assert!(alice_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unclaim_resets_and_cancels() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;
    let carol = app.user("300", Some("Carol")).await;

    let id = app.create_order(&alice.token, "BUY").await;
    app.act(&id, "claim", &bob.token).await;
    let mut alice_rx = app.state.hub.register(&alice.user.discord_id).rx;

    // Only the claimer may unclaim
    let (status, _) = app.act(&id, "unclaim", &carol.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, order) = app.act(&id, "unclaim", &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "OPEN");
    assert!(order["claimerId"].is_null());
    assert_eq!(
        notification_type(alice_rx.try_recv().unwrap()),
        NotificationType::OrderCancelled
    );
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;
    let carol = app.user("300", Some("Carol")).await;

    let id = app.create_order(&alice.token, "BUY").await;

    let (bob_claim, carol_claim) = tokio::join!(
        app.act(&id, "claim", &bob.token),
        app.act(&id, "claim", &carol.token)
    );

    let statuses = [bob_claim.0, carol_claim.0];
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::OK).count(),
        1,
        "{:?}",
        statuses
    );
    assert!(statuses.iter().any(|s| s.is_client_error()));

    let (_, order) = app.get(&format!("/api/orders/{}", id), &alice.token).await;
    let winner = if bob_claim.0 == StatusCode::OK { &bob } else { &carol };
    assert_eq!(order["claimerId"], winner.user.id.to_string());
}

#[tokio::test]
async fn test_claim_rules() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;
    let carol = app.user("300", Some("Carol")).await;

    let id = app.create_order(&alice.token, "SELL").await;

    // Own order
    let (status, body) = app.act(&id, "claim", &alice.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BIZ_5007");

    // SELL claim lands on READY_TO_TRADE
    let (_, order) = app.act(&id, "claim", &bob.token).await;
    assert_eq!(order["status"], "READY_TO_TRADE");

    // Not open any more
    let (status, _) = app.act(&id, "claim", &carol.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Outsiders cannot complete
    let (status, _) = app.act(&id, "complete", &carol.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, order) = app.act(&id, "complete", &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "FULFILLED");
}

#[tokio::test]
async fn test_sell_cannot_be_in_progress() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;

    let (status, body) = app
        .post(
            "/api/orders",
            &alice.token,
            json!({
                "itemName": "salt",
                "tier": 2,
                "pricePerUnit": 4,
                "amount": 10,
                "orderType": "SELL",
                "status": "IN_PROGRESS",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BIZ_5007");
}

#[tokio::test]
async fn test_create_validates_input() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;

    let (status, body) = app
        .post(
            "/api/orders",
            &alice.token,
            json!({
                "itemName": "salt",
                "tier": 11,
                "pricePerUnit": 4,
                "amount": 10,
                "orderType": "BUY",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "tier");

    let (status, _) = app
        .post("/api/orders", &alice.token, json!({ "itemName": "salt" }))
        .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_owner_edit_and_delete() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;

    let id = app.create_order(&alice.token, "BUY").await;
    app.act(&id, "claim", &bob.token).await;

    // Switching a claimed BUY to SELL moves it to READY_TO_TRADE
    let (status, order) = app
        .request(
            Method::PATCH,
            &format!("/api/orders/{}/edit", id),
            Some(&alice.token),
            Some(json!({ "orderType": "SELL", "amount": 12 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["orderType"], "SELL");
    assert_eq!(order["status"], "READY_TO_TRADE");
    assert_eq!(order["amount"], 12);

    // Non-owners cannot edit or delete
    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/orders/{}/edit", id),
            Some(&bob.token),
            Some(json!({ "amount": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/orders/{}", id), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Deleting a claimed order tells the creator it was cancelled
    let mut alice_rx = app.state.hub.register(&alice.user.discord_id).rx;
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/orders/{}", id), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        notification_type(alice_rx.try_recv().unwrap()),
        NotificationType::OrderCancelled
    );

    let (status, _) = app.get(&format!("/api/orders/{}", id), &alice.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_filters_and_paginates() {
    let app = TestApp::new();
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;

    for _ in 0..3 {
        app.create_order(&alice.token, "BUY").await;
    }
    let sell = app.create_order(&bob.token, "SELL").await;

    let (status, page) = app
        .get("/api/orders?orderType=BUY&limit=2&page=1", &alice.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], 3);
    assert_eq!(page["orders"].as_array().unwrap().len(), 2);
    assert_eq!(page["hasMore"], true);

    let (_, page) = app
        .get(
            &format!("/api/orders?userId={}&includeUserData=true", bob.user.id),
            &alice.token,
        )
        .await;
    let orders = page["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], sell);
    assert_eq!(orders[0]["creator"]["inGameName"], "Bob");
}

#[tokio::test]
async fn test_profile_gate_and_auth() {
    let app = TestApp::new();
    let newcomer = app.user("400", None).await;

    // No token
    let (status, _) = app.request(Method::GET, "/api/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Garbage token
    let (status, _) = app.get("/api/orders", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Profile incomplete
    let (status, body) = app.get("/api/orders", &newcomer.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "PROFILE_INCOMPLETE");

    // The profile itself stays reachable
    let (status, _) = app.get("/api/users/me", &newcomer.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, user) = app
        .request(
            Method::PATCH,
            "/api/users/me",
            Some(&newcomer.token),
            Some(json!({ "inGameName": "  Newt  " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["inGameName"], "Newt");

    let (status, _) = app.get("/api/orders", &newcomer.token).await;
    assert_eq!(status, StatusCode::OK);
}
