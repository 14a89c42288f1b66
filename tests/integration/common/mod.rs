#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use farmy_fish_fry::auth::Claims;
use farmy_fish_fry::database::{InMemoryDatabase, Storage, UserRepository};
use farmy_fish_fry::models::user::{DiscordIdentity, UpdateProfileRequest, User};
use farmy_fish_fry::router::build_router;
use farmy_fish_fry::startup::build_state;
use farmy_fish_fry::{AppState, Config};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const ADMIN_PASSWORD: &str = "let-me-in";

/// Router over a fresh in-memory backend
pub struct TestApp {
    pub state: AppState,
    pub db: Arc<InMemoryDatabase>,
    router: Router,
}

/// A signed-in test user
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let config = Config::for_memory(JWT_SECRET, ADMIN_PASSWORD);
        let db = Arc::new(InMemoryDatabase::new());
        let state = build_state(&config, Storage::from_memory(db.clone()), None);
        let router = build_router(state.clone());
        Self { state, db, router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Create a user, optionally with an in-game name, and sign a token for it
    pub async fn user(&self, discord_id: &str, in_game_name: Option<&str>) -> TestUser {
        let mut user = self
            .db
            .upsert_discord_user(&DiscordIdentity {
                discord_id: discord_id.to_string(),
                discord_name: format!("discord-{}", discord_id),
            })
            .await
            .unwrap();

        if let Some(name) = in_game_name {
            let update = UpdateProfileRequest {
                in_game_name: Some(name.to_string()),
                ..Default::default()
            };
            user = self.db.update_profile(user.id, &update).await.unwrap().unwrap();
        }

        let token = self
            .state
            .jwt_service
            .encode_token(&Claims::new(&user, 3600))
            .unwrap();
        TestUser { user, token }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// POST a lifecycle action with no body
    pub async fn act(&self, order_id: &str, action: &str, token: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            &format!("/api/orders/{}/{}", order_id, action),
            Some(token),
            None,
        )
        .await
    }

    /// Create a 10x salt T2 order and return its id
    pub async fn create_order(&self, token: &str, order_type: &str) -> String {
        let (status, body) = self
            .post(
                "/api/orders",
                token,
                json!({
                    "itemName": "Salt",
                    "tier": 2,
                    "pricePerUnit": 4,
                    "amount": 10,
                    "orderType": order_type,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}
