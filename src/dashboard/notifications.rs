//! Transient user-facing notifications.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Neutral,
    Success,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: Option<String>,
    pub variant: Variant,
}

impl Notification {
    fn with_variant(title: impl Into<String>, variant: Variant) -> Self {
        Self {
            title: title.into(),
            description: None,
            variant,
        }
    }

    pub fn neutral(title: impl Into<String>) -> Self {
        Self::with_variant(title, Variant::Neutral)
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::with_variant(title, Variant::Success)
    }

    pub fn destructive(title: impl Into<String>) -> Self {
        Self::with_variant(title, Variant::Destructive)
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_destructive(&self) -> bool {
        self.variant == Variant::Destructive
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications to a receiver owned by whoever renders them.
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // A closed receiver means nobody is rendering anymore.
        let _ = self.sender.send(notification);
    }
}

/// Writes notifications to the log. Used by the HTTP surface, where the
/// response body already carries the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let description = notification.description.as_deref().unwrap_or_default();
        if notification.is_destructive() {
            warn!(title = %notification.title, description, "notification");
        } else {
            info!(title = %notification.title, description, "notification");
        }
    }
}
