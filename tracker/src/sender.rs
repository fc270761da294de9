//! HTTP delivery of tracking events.
//!
//! The sender issues a single `POST` per event to the analytics endpoint
//! with bearer authentication and a 15-second timeout, then interprets the
//! `{ok, error}` response envelope. It never retries: durable retry lives
//! in the event queue, owned by the tracker.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{Event, Metadata};

/// Production analytics endpoint.
pub const DX_API_URL: &str = "https://api.getdx.com/events.track";

/// HTTP request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Errors that can occur while sending an event.
#[derive(Error, Debug)]
pub enum SenderError {
    /// Transport, serialization, or response decode failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server acknowledged the request but reported a failure.
    #[error("event rejected by server: {message}")]
    Api { message: String },
}

/// Configuration for the sender.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Endpoint URL. Overridable for tests.
    pub api_url: String,

    /// Bearer token for the analytics API.
    pub api_token: String,

    /// GitHub username attached to every event.
    pub github_username: String,

    /// Tag outgoing events as test data.
    pub test_mode: bool,
}

impl SenderConfig {
    /// Creates a configuration pointing at the production endpoint.
    #[must_use]
    pub fn new(api_token: String, github_username: String, test_mode: bool) -> Self {
        Self {
            api_url: DX_API_URL.to_string(),
            api_token,
            github_username,
            test_mode,
        }
    }

    /// Overrides the endpoint URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }
}

/// Request body for the track endpoint.
///
/// The timestamp is a string-encoded decimal, matching what the endpoint
/// expects.
#[derive(Debug, Serialize)]
struct TrackRequest<'a> {
    name: &'a str,
    metadata: &'a Metadata,
    timestamp: String,
    github_username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_data: Option<bool>,
}

/// Response envelope from the track endpoint.
#[derive(Debug, Deserialize)]
struct TrackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP event sender.
#[derive(Debug, Clone)]
pub struct Sender {
    config: SenderConfig,
    client: Client,
}

impl Sender {
    /// Creates a new sender with the given configuration.
    #[must_use]
    pub fn new(config: SenderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to create HTTP client");

        Self { config, client }
    }

    /// Sends a single event.
    ///
    /// Success is exactly `ok == true` in the response envelope.
    ///
    /// # Errors
    ///
    /// Returns `SenderError::Http` if the request, serialization, or
    /// response decode fails, and `SenderError::Api` when the server
    /// reports `ok == false`.
    pub async fn send(&self, event: &Event) -> Result<(), SenderError> {
        let body = TrackRequest {
            name: &event.name,
            metadata: &event.metadata,
            timestamp: event.timestamp.to_string(),
            github_username: &self.config.github_username,
            test_data: self.config.test_mode.then_some(true),
        };

        debug!(name = %event.name, url = %self.config.api_url, "Sending event");

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await?
            .json::<TrackResponse>()
            .await?;

        if !response.ok {
            return Err(SenderError::Api {
                message: response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(())
    }
}
