//! Notification dispatch
//!
//! Engines enqueue notifications without waiting on delivery. A bounded
//! outbox feeds a background dispatcher that hands each notification to a
//! [`NotificationSink`]. Enqueue never fails the calling operation: a full
//! or closed outbox is logged and the notification is dropped.

pub mod sink;

pub use sink::{LoggingSink, NatsSink, NotificationSink, RecordingSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::graph::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    CredentialReceived,
    CredentialAccepted,
    BoostReceived,
    BoostAccepted,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialReceived => "CREDENTIAL_RECEIVED",
            Self::CredentialAccepted => "CREDENTIAL_ACCEPTED",
            Self::BoostReceived => "BOOST_RECEIVED",
            Self::BoostAccepted => "BOOST_ACCEPTED",
        }
    }
}

/// Sender or recipient of a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationParty {
    pub profile_id: String,
    pub did: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub display_name: String,
}

impl From<&Profile> for NotificationParty {
    fn from(profile: &Profile) -> Self {
        Self {
            profile_id: profile.profile_id.clone(),
            did: profile.did.clone(),
            display_name: profile.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vc_uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id, used to de-duplicate redeliveries
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub to: NotificationParty,
    pub from: NotificationParty,
    pub message: NotificationMessage,
    pub data: NotificationData,
    pub sent: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        notification_type: NotificationType,
        to: NotificationParty,
        from: NotificationParty,
        message: NotificationMessage,
        data: NotificationData,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            notification_type,
            to,
            from,
            message,
            data,
            sent: Utc::now(),
        }
    }
}

/// Sending half of the outbox
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    /// Create the outbox and spawn its dispatcher
    pub fn spawn(capacity: usize, sink: Arc<dyn NotificationSink>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(dispatch(rx, sink));
        (Self { tx }, handle)
    }

    /// Queue a notification for delivery; never blocks and never fails
    pub fn enqueue(&self, notification: Notification) {
        let notification_type = notification.notification_type.as_str();
        match self.tx.try_send(notification) {
            Ok(()) => debug!(notification_type = %notification_type, "Notification queued"),
            Err(mpsc::error::TrySendError::Full(n)) => warn!(
                notification_type = %notification_type,
                to = %n.to.profile_id,
                "Notification outbox full, dropping notification"
            ),
            Err(mpsc::error::TrySendError::Closed(n)) => warn!(
                notification_type = %notification_type,
                to = %n.to.profile_id,
                "Notification outbox closed, dropping notification"
            ),
        }
    }
}

async fn dispatch(mut rx: mpsc::Receiver<Notification>, sink: Arc<dyn NotificationSink>) {
    while let Some(notification) = rx.recv().await {
        if let Err(e) = sink.deliver(&notification).await {
            warn!(
                notification_type = %notification.notification_type.as_str(),
                to = %notification.to.profile_id,
                error = %e,
                "Notification delivery failed"
            );
        }
    }
    debug!("Notification dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn party(id: &str) -> NotificationParty {
        NotificationParty {
            profile_id: id.to_string(),
            did: format!("did:web:example.com:users:{}", id),
            display_name: String::new(),
        }
    }

    fn notification() -> Notification {
        Notification::new(
            NotificationType::CredentialReceived,
            party("userb"),
            party("usera"),
            NotificationMessage {
                title: Some("Credential Received".into()),
                body: None,
            },
            NotificationData {
                vc_uris: Some(vec!["lc:network:example.com/trpc:credential:1".into()]),
                metadata: None,
            },
        )
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_to_sink() {
        let sink = Arc::new(RecordingSink::new());
        let (queue, handle) = NotificationQueue::spawn(8, sink.clone());

        queue.enqueue(notification());
        drop(queue);
        handle.await.unwrap();

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].notification_type, NotificationType::CredentialReceived);
    }

    #[tokio::test]
    async fn test_closed_outbox_does_not_fail() {
        let sink = Arc::new(RecordingSink::new());
        let (queue, handle) = NotificationQueue::spawn(1, sink);
        handle.abort();
        let _ = handle.await;

        // Receiver is gone; enqueue only logs
        queue.enqueue(notification());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(notification()).unwrap();
        assert_eq!(json["type"], "CREDENTIAL_RECEIVED");
        assert_eq!(json["to"]["profileId"], "userb");
        assert_eq!(json["data"]["vcUris"][0], "lc:network:example.com/trpc:credential:1");
        assert_eq!(
            NatsSink::subject(&notification()),
            "lcn.notifications.CREDENTIAL_RECEIVED"
        );
    }
}
