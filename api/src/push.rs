//! Push notification client.
//!
//! POSTs messages to an FCM-style HTTP gateway keyed by per-device tokens.
//! Delivery is best-effort: callers decide whether a transport failure is
//! fatal. The `mock-push` feature records messages in memory instead of
//! sending them so tests can assert on the outbox.

use anyhow::Result;
#[cfg(not(feature = "mock-push"))]
use anyhow::Context;
#[cfg(not(feature = "mock-push"))]
use secrecy::{ExposeSecret, SecretBox};
#[cfg(feature = "mock-push")]
use std::sync::{Arc, Mutex};

use crate::Config;

#[derive(Debug, Clone)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[cfg_attr(feature = "mock-push", derive(Clone, Default))]
pub struct PushClient {
    #[cfg(not(feature = "mock-push"))]
    http: reqwest::Client,
    #[cfg(not(feature = "mock-push"))]
    gateway_url: String,
    #[cfg(not(feature = "mock-push"))]
    server_key: SecretBox<String>,
    #[cfg(feature = "mock-push")]
    outbox: Arc<Mutex<MockOutbox>>,
}

#[cfg(not(feature = "mock-push"))]
impl PushClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            gateway_url: config.push_gateway_url.clone(),
            server_key: SecretBox::new(Box::new(
                config.push_gateway_key.expose_secret().clone(),
            )),
        }
    }

    /// Send one message, returning the transport message id.
    #[tracing::instrument(skip(self, message), fields(token_len = message.token.len()))]
    pub async fn send(&self, message: PushMessage) -> Result<String> {
        let payload = serde_json::json!({
            "to": message.token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
        });

        let response = self
            .http
            .post(&self.gateway_url)
            .header(
                "Authorization",
                format!("key={}", self.server_key.expose_secret()),
            )
            .json(&payload)
            .send()
            .await
            .context("Failed to reach push gateway")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Push gateway returned {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("Push gateway returned invalid JSON")?;
        // FCM-style responses nest the id under results[0]; a bare
        // message_id is accepted from simpler gateways.
        let message_id = body["results"][0]["message_id"]
            .as_str()
            .or_else(|| body["message_id"].as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow::anyhow!("Push gateway response carried no message id")
            })?;

        tracing::info!(%message_id, "Push message sent");
        Ok(message_id)
    }
}

#[cfg(feature = "mock-push")]
#[derive(Default)]
struct MockOutbox {
    sent: Vec<PushMessage>,
}

#[cfg(feature = "mock-push")]
impl PushClient {
    pub fn new(_config: &Config) -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(self, message), fields(token_len = message.token.len()))]
    pub async fn send(&self, message: PushMessage) -> Result<String> {
        let mut outbox = self.outbox.lock().unwrap();
        outbox.sent.push(message);
        Ok(format!("mock-msg-{:06}", outbox.sent.len()))
    }

    /// Messages recorded so far, in send order.
    pub fn sent(&self) -> Vec<PushMessage> {
        self.outbox.lock().unwrap().sent.clone()
    }
}
