//! Webhook client
//!
//! One GET per refresh, bounded by a wall-clock timeout. Every failure is
//! fatal for that cycle and surfaces as a [`FetchError`]; no partial payload
//! is ever returned.

use std::time::Duration;

use crmdash_common::Payload;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const USER_AGENT: &str = concat!("crmdash-sync/", env!("CARGO_PKG_VERSION"));

/// Characters of an unparseable body kept for the log
const BODY_PREVIEW_CHARS: usize = 100;

/// Webhook fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Webhook returned an empty response")]
    EmptyBody,

    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Network error: {0}")]
    Transport(String),
}

/// HTTP client for the CRM export webhook
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http_client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and unpack the current export.
    ///
    /// A `_t` millisecond timestamp is appended so intermediate caches never
    /// serve a stale export.
    pub async fn fetch(&self) -> Result<Payload, FetchError> {
        let cache_buster = chrono::Utc::now().timestamp_millis().to_string();
        debug!(url = %self.url, timeout = ?self.timeout, "Fetching webhook export");

        let response = self
            .http_client
            .get(&self.url)
            .query(&[("_t", cache_buster.as_str())])
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await.map_err(|e| self.map_transport(e))?;
        if body.trim().is_empty() {
            warn!(url = %self.url, "Webhook returned an empty response");
            return Err(FetchError::EmptyBody);
        }

        let payload = Payload::parse(&body).map_err(|e| {
            let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
            error!(preview = %preview, "Failed to parse webhook response as JSON");
            FetchError::InvalidJson(e.to_string())
        })?;

        info!(
            cards = payload.cards.len(),
            steps = payload.steps.len(),
            tags = payload.tags.len(),
            bytes = body.len(),
            "Webhook export received"
        );
        Ok(payload)
    }

    fn map_transport(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
