use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use recap_types::DeliveryError;
use recap_types::api::SlashResponse;
use recap_types::ports::ResponseSink;
use recap_types::truncate_chars;

/// Platform cap on message text.
pub const MAX_TEXT_CHARS: usize = 3000;

/// One-shot poster for `response_url` callbacks.
///
/// Uses its own client so the delivery timeout stays independent of (and far
/// shorter than) the time the pipeline took to produce the payload.
#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create webhook client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ResponseSink for WebhookClient {
    async fn deliver(&self, response_url: &str, body: &SlashResponse) -> Result<(), DeliveryError> {
        if response_url.trim().is_empty() {
            return Err(DeliveryError::MissingUrl);
        }

        let mut body = body.clone();
        body.text = truncate_chars(&body.text, MAX_TEXT_CHARS);

        let response = self
            .http
            .post(response_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Callback rejected with {}: {}", status, truncate_chars(&text, 200));
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: truncate_chars(&text, 200),
            });
        }

        info!("Delivered {} chars to callback", body.text.chars().count());
        Ok(())
    }
}
