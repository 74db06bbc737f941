//! Best-effort alerts when a refresh arrives from a new network origin.
//!
//! Delivery is a single attempt. Failures go back to the caller, which only
//! logs them; nothing here is a security control.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::types::UserId;

pub const ORIGIN_CHANGE_MESSAGE: &str = "A token refresh attempt was made from a new IP address.";

/// JSON document posted to the webhook sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginChange {
    pub user_id: UserId,
    pub old_ip: String,
    pub new_ip: String,
    pub message: String,
}

impl OriginChange {
    pub fn new(user_id: UserId, old_ip: impl Into<String>, new_ip: impl Into<String>) -> Self {
        Self {
            user_id,
            old_ip: old_ip.into(),
            new_ip: new_ip.into(),
            message: ORIGIN_CHANGE_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnomalyNotifier: Send + Sync {
    async fn notify_origin_change(&self, alert: &OriginChange) -> Result<(), WebhookError>;
}

/// Posts [`OriginChange`] alerts to a fixed webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    /// `timeout` bounds each delivery attempt end to end.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AnomalyNotifier for WebhookNotifier {
    async fn notify_origin_change(&self, alert: &OriginChange) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(alert)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}
