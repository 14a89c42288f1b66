//! Push stream and polling snapshot
//!
//! The stream is the low-latency path; the snapshot lets clients reconcile
//! anything missed while disconnected.

use axum::{
    Json,
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::auth::middleware::{AuthenticatedUser, CurrentUser};
use crate::error::Result;
use crate::models::notification::StreamMessage;
use crate::models::order::Order;
use crate::services::NotificationHub;
use crate::services::notification_hub::Registration;

/// Deregisters the connection when the response stream is dropped
struct StreamGuard {
    hub: NotificationHub,
    user_key: String,
    connection_id: Uuid,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.hub.deregister(&self.user_key, self.connection_id);
    }
}

fn to_event(message: &StreamMessage) -> Option<Event> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            warn!(kind = message.kind(), error = %e, "Dropping unserializable stream message");
            None
        }
    }
}

/// Open the push channel
/// GET /api/notifications/stream
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    tag = "notifications",
    params(("token" = Option<String>, Query, description = "JWT, for clients that cannot set headers")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Server-sent events: connected, ping, order_notification", content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn notification_stream(
    State(hub): State<NotificationHub>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let user_key = claims.discord_id.clone();
    let Registration { connection_id, rx } = hub.register(&user_key);
    hub.spawn_heartbeat(&user_key, connection_id);
    info!(user_id = %claims.sub, connection_id = %connection_id, "📡 Notification stream opened");

    let guard = StreamGuard {
        hub,
        user_key: user_key.clone(),
        connection_id,
    };
    let connected = StreamMessage::Connected { user_id: user_key };

    let updates = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        rx.recv().await.map(|message| (message, (rx, guard)))
    });

    let events = stream::once(async move { connected })
        .chain(updates)
        .filter_map(|message| async move { to_event(&message).map(Ok) });

    Sse::new(events)
}

/// Orders the caller created or claimed, for polling reconciliation
/// GET /api/orders/notifications
#[utoipa::path(
    get,
    path = "/api/orders/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Orders where the caller is creator or claimer", body = Vec<Order>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn notification_snapshot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.lifecycle.party_snapshot(user.id).await?))
}
