//! Push subscription over `GET /api/notifications/stream`.
//!
//! The connection is re-opened after a fixed delay whenever it fails or ends,
//! and right away when the host becomes visible while it is down.

use futures::StreamExt;
use reqwest::header::ACCEPT;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{ClientError, ClientResult, NotificationConsumer, regained};
use crate::models::notification::StreamMessage;

/// Incremental `text/event-stream` decoder yielding each event's data
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the data payloads of every completed event
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }

        events
    }
}

/// Owns the push connection for one consumer
pub struct StreamSubscriber {
    consumer: NotificationConsumer,
    http: reqwest::Client,
}

impl StreamSubscriber {
    pub fn new(consumer: NotificationConsumer, http: reqwest::Client) -> Self {
        Self { consumer, http }
    }

    /// Reconnect forever
    pub async fn run(self, mut visibility: watch::Receiver<bool>) {
        let delay = self.consumer.config().reconnect_delay;

        loop {
            match self.connect_once().await {
                Ok(()) => info!("Notification stream closed by server"),
                Err(e) => warn!(error = %e, "Notification stream failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    debug!(delay_secs = delay.as_secs(), "Reconnecting notification stream");
                }
                _ = regained(&mut visibility) => {
                    debug!("Visibility regained, reconnecting notification stream");
                }
            }
        }
    }

    /// Hold one connection open until it ends
    pub async fn connect_once(&self) -> ClientResult<()> {
        let config = self.consumer.config();
        let response = self
            .http
            .get(config.endpoint("/api/notifications/stream"))
            .bearer_auth(&config.token)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }

        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            for data in parser.feed(&chunk?) {
                self.handle(&data).await;
            }
        }
        Ok(())
    }

    async fn handle(&self, data: &str) {
        let message = match serde_json::from_str::<StreamMessage>(data) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable stream event");
                return;
            }
        };

        match message {
            StreamMessage::Connected { user_id } => {
                info!(user_id = %user_id, "Notification stream connected");
            }
            StreamMessage::Ping { .. } => debug!("Stream heartbeat"),
            StreamMessage::OrderNotification(event) => {
                if let Err(e) = self.consumer.ingest(event).await {
                    warn!(error = %e, "Failed to store pushed notification");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{RecordingSink, event};
    use crate::client::{ConsumerConfig, Visibility};
    use crate::models::notification::NotificationType;
    use std::sync::Arc;
    use uuid::Uuid;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parser_handles_split_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: {\"type\":").is_empty());
        assert!(parser.feed(b"\"ping\",\"timestamp\":1}\r\n").is_empty());

        let events = parser.feed(b"\r\n: comment\n\ndata: a\ndata: b\n\n");
        assert_eq!(events, vec![
            "{\"type\":\"ping\",\"timestamp\":1}".to_string(),
            "a\nb".to_string(),
        ]);
    }

    #[test]
    fn test_parser_ignores_other_fields() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: message\nid: 7\nretry: 5000\ndata:x\n\n");
        assert_eq!(events, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_connect_once_materializes_notifications() {
        let mock_server = MockServer::start().await;
        let pushed = event(NotificationType::OrderClaimed);

        let body = format!(
            "data: {}\n\ndata: {}\n\ndata: {}\n\n",
            serde_json::to_string(&StreamMessage::Connected {
                user_id: "42".to_string()
            })
            .unwrap(),
            serde_json::to_string(&StreamMessage::Ping { timestamp: 1 }).unwrap(),
            serde_json::to_string(&StreamMessage::OrderNotification(pushed.clone())).unwrap(),
        );

        Mock::given(method("GET"))
            .and(path("/api/notifications/stream"))
            .and(header("authorization", "Bearer token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = ConsumerConfig::new(mock_server.uri(), "token", Uuid::new_v4());
        config.store_path = dir.path().join("n.json");
        let sink = Arc::new(RecordingSink::default());
        let consumer = NotificationConsumer::new(config, sink.clone(), Visibility::new(true))
            .await
            .unwrap();

        let subscriber = StreamSubscriber::new(consumer.clone(), reqwest::Client::new());
        subscriber.connect_once().await.unwrap();

        let store = consumer.store();
        let store = store.lock().await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].id, pushed.id);
        assert_eq!(sink.toasts.lock().unwrap().as_slice(), &[pushed.id.clone()]);
    }

    #[tokio::test]
    async fn test_connect_once_reports_rejection() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = ConsumerConfig::new(mock_server.uri(), "bad", Uuid::new_v4());
        config.store_path = dir.path().join("n.json");
        let consumer = NotificationConsumer::new(
            config,
            Arc::new(RecordingSink::default()),
            Visibility::new(true),
        )
        .await
        .unwrap();

        let err = StreamSubscriber::new(consumer, reqwest::Client::new())
            .connect_once()
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { .. }));
    }
}
