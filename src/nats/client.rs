//! NATS client wrapper
//!
//! Connection management with credentials, keep-alive and publish helpers
//! for JSON payloads.

use async_nats::{Client, ConnectOptions, HeaderMap, HeaderValue};
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::config::NatsArgs;
use crate::types::BrainError;

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    name: String,
}

impl NatsClient {
    pub async fn new(args: &NatsArgs, name: &str) -> Result<Self, BrainError> {
        info!("Connecting to NATS at {}", args.nats_url);

        // No retry on initial connect: dev mode falls back to the logging sink
        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| BrainError::Nats(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self {
            client,
            name: name.to_string(),
        })
    }

    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BrainError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| BrainError::Nats(format!("Publish failed: {}", e)))
    }

    pub async fn publish_with_headers(
        &self,
        subject: &str,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<(), BrainError> {
        self.client
            .publish_with_headers(subject.to_string(), headers, payload)
            .await
            .map_err(|e| BrainError::Nats(format!("Publish failed: {}", e)))
    }

    /// Serialize `value` as JSON and publish it, tagged with a message id
    pub async fn publish_json<T: Serialize>(
        &self,
        subject: &str,
        message_id: &str,
        value: &T,
    ) -> Result<(), BrainError> {
        let payload = serde_json::to_vec(value)
            .map_err(|e| BrainError::Internal(format!("Failed to encode message: {}", e)))?;

        self.publish_with_headers(subject, headers_with_id(message_id), Bytes::from(payload))
            .await
    }

    pub async fn flush(&self) -> Result<(), BrainError> {
        self.client
            .flush()
            .await
            .map_err(|e| BrainError::Nats(format!("Flush failed: {}", e)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Headers carrying a message id, used by consumers to drop redeliveries
pub fn headers_with_id(message_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = message_id.parse::<HeaderValue>() {
        headers.insert("Nats-Msg-Id", value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_with_id() {
        let headers = headers_with_id("abc-123");
        assert_eq!(headers.get("Nats-Msg-Id").map(|v| v.as_str()), Some("abc-123"));
    }
}
