//! Notification delivery targets

use std::sync::Mutex;
use tracing::info;

use super::Notification;
use crate::nats::NatsClient;
use crate::types::Result;

/// Subject prefix notifications are published under
pub const SUBJECT_PREFIX: &str = "lcn.notifications";

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Publishes to `lcn.notifications.<type>`
pub struct NatsSink {
    client: NatsClient,
}

impl NatsSink {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }

    pub fn subject(notification: &Notification) -> String {
        format!("{}.{}", SUBJECT_PREFIX, notification.notification_type.as_str())
    }
}

#[async_trait::async_trait]
impl NotificationSink for NatsSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.client
            .publish_json(&Self::subject(notification), &notification.id, notification)
            .await
    }
}

/// Logs notifications instead of delivering them (dev mode)
pub struct LoggingSink;

#[async_trait::async_trait]
impl NotificationSink for LoggingSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            notification_type = %notification.notification_type.as_str(),
            to = %notification.to.profile_id,
            from = %notification.from.profile_id,
            "Notification (not delivered, dev mode)"
        );
        Ok(())
    }
}

/// Keeps every delivered notification in memory
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(notification.clone());
        }
        Ok(())
    }
}
