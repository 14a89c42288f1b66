//! Admin grant, order moderation and pricing over the HTTP router

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{ADMIN_PASSWORD, TestApp, TestUser};
use farmy_fish_fry::models::notification::{NotificationType, StreamMessage};

async fn admin(app: &TestApp) -> TestUser {
    let user = app.user("900", Some("Mod")).await;
    let (status, body) = app
        .post(
            "/api/admin/auth",
            &user.token,
            json!({ "password": ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], true);
    user
}

#[tokio::test]
async fn test_grant_requires_password() {
    let app = TestApp::new();
    let user = app.user("100", Some("Alice")).await;

    let (status, body) = app.get("/api/admin/auth", &user.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], false);

    let (status, _) = app
        .post("/api/admin/auth", &user.token, json!({ "password": "guess" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/admin/orders", &user.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::GET, "/api/admin/orders", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_lists_orders_with_parties() {
    let app = TestApp::new();
    let moderator = admin(&app).await;
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;

    let id = app.create_order(&alice.token, "BUY").await;
    app.act(&id, "claim", &bob.token).await;

    let (status, page) = app
        .get("/api/admin/orders?status=IN_PROGRESS", &moderator.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let orders = page["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["creator"]["inGameName"], "Alice");
    assert_eq!(orders[0]["claimer"]["inGameName"], "Bob");
}

#[tokio::test]
async fn test_admin_edit_rules() {
    let app = TestApp::new();
    let moderator = admin(&app).await;
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;

    let id = app.create_order(&alice.token, "SELL").await;
    let uri = format!("/api/admin/orders/{}", id);

    // SELL orders never hold IN_PROGRESS
    let (status, _) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&moderator.token),
            Some(json!({ "status": "IN_PROGRESS" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown claimer
    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&moderator.token),
            Some(json!({ "claimerId": uuid::Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "claimerId");

    // Assign a claimer and mark it fulfilled
    let (status, order) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&moderator.token),
            Some(json!({
                "status": "FULFILLED",
                "claimerId": bob.user.id,
                "pricePerUnit": 6,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", order);
    assert_eq!(order["status"], "FULFILLED");
    assert_eq!(order["claimerId"], bob.user.id.to_string());
    assert!(!order["fulfilledAt"].is_null());

    // Reopening drops the old fulfilment time
    let (status, order) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&moderator.token),
            Some(json!({ "status": "OPEN", "claimerId": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", order);
    assert_eq!(order["status"], "OPEN");
    assert!(order["claimerId"].is_null());
    assert!(order["fulfilledAt"].is_null());
}

#[tokio::test]
async fn test_admin_delete_ignores_status() {
    let app = TestApp::new();
    let moderator = admin(&app).await;
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;

    let id = app.create_order(&alice.token, "SELL").await;
    app.act(&id, "claim", &bob.token).await;
    app.act(&id, "complete", &alice.token).await;

    // Owners cannot remove fulfilled orders
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/orders/{}", id), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/admin/orders/{}", id),
            Some(&moderator.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/admin/orders/{}", id),
            Some(&moderator.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_delete_of_claimed_order_cancels() {
    let app = TestApp::new();
    let moderator = admin(&app).await;
    let alice = app.user("100", Some("Alice")).await;
    let bob = app.user("200", Some("Bob")).await;

    let id = app.create_order(&alice.token, "BUY").await;
    app.act(&id, "claim", &bob.token).await;
    let mut alice_rx = app.state.hub.register(&alice.user.discord_id).rx;

    app.request(
        Method::DELETE,
        &format!("/api/admin/orders/{}", id),
        Some(&moderator.token),
        None,
    )
    .await;

    match alice_rx.try_recv().unwrap() {
        StreamMessage::OrderNotification(event) => {
            assert_eq!(event.notification_type, NotificationType::OrderCancelled);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_pricing_flow() {
    let app = TestApp::new();
    let moderator = admin(&app).await;
    let alice = app.user("100", Some("Alice")).await;

    let (status, entry) = app
        .post(
            "/api/admin/pricing",
            &moderator.token,
            json!({ "itemName": " Salt ", "tier": 2, "price": 4 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["itemName"], "salt");

    // Members cannot write prices
    let (status, _) = app
        .post(
            "/api/admin/pricing",
            &alice.token,
            json!({ "itemName": "pepper", "tier": 1, "price": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, changed) = app
        .request(
            Method::PUT,
            "/api/admin/pricing",
            Some(&moderator.token),
            Some(json!({ "prices": [
                { "itemName": "salt", "tier": 2, "price": 5 },
                { "itemName": "pepper", "tier": 1, "price": 2 },
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed.as_array().unwrap().len(), 2);

    let (status, suggestion) = app
        .get("/api/pricing/suggest?itemName=SALT&tier=2", &alice.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suggestion["suggestedPrice"], 5.0);

    let (_, data) = app.get("/api/pricing/data", &alice.token).await;
    assert_eq!(data["entries"].as_array().unwrap().len(), 2);
    assert_eq!(data["metadata"]["lastUpdatedBy"], moderator.user.id.to_string());

    let (status, history) = app
        .get("/api/admin/pricing/history?limit=10", &moderator.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 3);
}
