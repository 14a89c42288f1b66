//! Capped local notification store persisted as a JSON file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

use super::ClientResult;
use crate::models::notification::{NotificationType, OrderDetails, OrderNotificationEvent};

/// A notification as kept on the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub order_id: Uuid,
    pub order_details: OrderDetails,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub play_sound: bool,
}

impl LocalNotification {
    pub fn from_event(event: OrderNotificationEvent, play_sound: bool) -> Self {
        Self {
            id: event.id,
            notification_type: event.notification_type,
            title: event.title,
            message: event.message,
            order_id: event.order_id,
            order_details: event.order_details,
            timestamp: event.timestamp,
            read: false,
            play_sound,
        }
    }
}

/// Newest-first list of at most `cap` notifications
#[derive(Debug)]
pub struct NotificationStore {
    path: PathBuf,
    cap: usize,
    items: Vec<LocalNotification>,
}

impl NotificationStore {
    /// Open the store at `path`; a missing or unreadable file starts empty
    pub async fn load(path: impl AsRef<Path>, cap: usize) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut items = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<LocalNotification>>(&bytes) {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding corrupt notification store");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        items.truncate(cap);

        Ok(Self { path, cap, items })
    }

    /// Insert at the front; false when the id is already present
    pub fn insert(&mut self, notification: LocalNotification) -> bool {
        if self.contains(&notification.id) {
            return false;
        }
        self.items.insert(0, notification);
        self.items.truncate(self.cap);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|n| n.id == id)
    }

    pub fn items(&self) -> &[LocalNotification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.read = true;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Write the whole list to disk
    pub async fn save(&self) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&self.items)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
