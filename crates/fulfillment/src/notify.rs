use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

/// Errors from the upstream notification call. Always non-fatal to
/// the fulfillment that triggered it.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("platform request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform rejected notification (status {status}): {body}")]
    Api { status: u16, body: String },
}

/// Post-commit callback to the upstream e-commerce platform.
#[async_trait]
pub trait PlatformNotifier: Send + Sync {
    /// Reports a completed fulfillment with its tracking details.
    async fn notify_fulfilled(
        &self,
        external_order_id: &str,
        tracking_number: &str,
        carrier: &str,
        tracking_url: &str,
    ) -> Result<(), NotifyError>;
}

/// Posts fulfillments to the platform admin API with a static access
/// token.
pub struct HttpPlatformNotifier {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpPlatformNotifier {
    pub fn new(base_url: String, access_token: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url,
            access_token,
        }
    }
}

#[async_trait]
impl PlatformNotifier for HttpPlatformNotifier {
    #[tracing::instrument(skip(self), fields(order = %external_order_id))]
    async fn notify_fulfilled(
        &self,
        external_order_id: &str,
        tracking_number: &str,
        carrier: &str,
        tracking_url: &str,
    ) -> Result<(), NotifyError> {
        let url = format!(
            "{}/orders/{}/fulfillments",
            self.base_url, external_order_id
        );
        let body = json!({
            "fulfillment": {
                "tracking_number": tracking_number,
                "tracking_company": carrier,
                "tracking_url": tracking_url,
                "notify_customer": true,
            }
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    notifications: Vec<(String, String, String)>,
    fail: bool,
}

/// In-memory notifier for tests. Records calls and can be told to
/// fail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail subsequent calls.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Recorded `(external_order_id, tracking_number, carrier)` calls.
    pub fn notifications(&self) -> Vec<(String, String, String)> {
        self.state.read().unwrap().notifications.clone()
    }
}

#[async_trait]
impl PlatformNotifier for InMemoryNotifier {
    async fn notify_fulfilled(
        &self,
        external_order_id: &str,
        tracking_number: &str,
        carrier: &str,
        _tracking_url: &str,
    ) -> Result<(), NotifyError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(NotifyError::Api {
                status: 503,
                body: "platform unavailable".to_string(),
            });
        }
        state.notifications.push((
            external_order_id.to_string(),
            tracking_number.to_string(),
            carrier.to_string(),
        ));
        Ok(())
    }
}
