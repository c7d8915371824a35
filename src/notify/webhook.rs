//! Generic JSON webhook notifier.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::collections::BTreeMap;

use super::{Notifier, NotifyError};
use crate::engine::Event;

/// POSTs the serialized event to a URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    headers: BTreeMap<String, String>,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: String, headers: BTreeMap<String, String>) -> Self {
        Self {
            client,
            url,
            headers,
        }
    }

    /// The POST request for an event, ready to send.
    pub fn request(&self, event: &Event) -> RequestBuilder {
        let mut request = self.client.post(&self.url).json(event);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        let response = self.request(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: "webhook",
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
