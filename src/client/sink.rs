//! Where materialized notifications surface on the device.

use tracing::info;

use super::store::LocalNotification;

/// User toggles for the optional signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub sound_enabled: bool,
    pub os_notifications_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            os_notifications_enabled: false,
        }
    }
}

/// Device-specific signalling
pub trait NotificationSink: Send + Sync {
    /// In-app toast, always shown
    fn toast(&self, notification: &LocalNotification);

    fn play_sound(&self, notification: &LocalNotification);

    fn os_notify(&self, notification: &LocalNotification);
}

/// Route one notification through the sink according to `preferences`
pub fn deliver(
    sink: &dyn NotificationSink,
    preferences: &Preferences,
    notification: &LocalNotification,
) {
    sink.toast(notification);
    if preferences.sound_enabled && notification.play_sound {
        sink.play_sound(notification);
    }
    if preferences.os_notifications_enabled {
        sink.os_notify(notification);
    }
}

/// Writes every signal to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn toast(&self, notification: &LocalNotification) {
        info!(
            notification_type = %notification.notification_type,
            order_id = %notification.order_id,
            "🔔 {}: {}",
            notification.title,
            notification.message
        );
    }

    fn play_sound(&self, notification: &LocalNotification) {
        info!(id = %notification.id, "🔊 chime");
    }

    fn os_notify(&self, notification: &LocalNotification) {
        info!(id = %notification.id, title = %notification.title, "OS notification requested");
    }
}
