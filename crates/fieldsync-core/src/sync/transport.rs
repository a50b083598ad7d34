//! HTTP boundary between the device and its central server.

use std::future::Future;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::RequestBuilder;
use thiserror::Error;

use crate::config::SyncSettings;
use crate::util::{normalize_text_option, truncate_chars};

const UNKNOWN_SERVER_ERROR: &str = "Unknown server error";
const RAW_ERROR_PREVIEW_CHARS: usize = 100;

/// Status and raw body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the central server acknowledged a pushed record
    pub const fn is_accepted(&self) -> bool {
        matches!(self.status, 200 | 201)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Human-readable failure message extracted from the body
    pub fn error_message(&self) -> String {
        parse_error_message(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failure, DNS failure, or timeout
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid transport configuration: {0}")]
    Client(String),
}

/// Requests a sync run issues against the central server.
///
/// Any HTTP status counts as a reply; only failing to get one is an error.
pub trait CentralTransport: Send + Sync {
    /// Connectivity probe against a candidate's root, returning the status
    fn probe(
        &self,
        base_url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<u16, TransportError>> + Send;

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> impl Future<Output = Result<HttpReply, TransportError>> + Send;

    fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<HttpReply, TransportError>> + Send;
}

/// `reqwest` implementation of `CentralTransport`
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_token: Option<String>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpTransport")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(settings: &SyncSettings) -> Result<Self, TransportError> {
        if !settings.verify_tls {
            tracing::warn!("TLS certificate verification is disabled for central server requests");
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!settings.verify_tls)
            .user_agent(concat!("fieldsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| TransportError::Client(error.to_string()))?;

        Ok(Self {
            client,
            api_token: normalize_text_option(settings.api_token.clone()),
        })
    }

    fn prepare(&self, request: RequestBuilder, timeout: Duration) -> RequestBuilder {
        let request = request
            .timeout(timeout)
            .header(ACCEPT, "application/json");
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> Result<HttpReply, TransportError> {
        let response = request.send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(network_error)?;
        Ok(HttpReply { status, body })
    }
}

impl CentralTransport for HttpTransport {
    async fn probe(&self, base_url: &str, timeout: Duration) -> Result<u16, TransportError> {
        let url = format!("{}/", base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(network_error)?;
        Ok(response.status().as_u16())
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        Self::send(self.prepare(self.client.post(url).json(body), timeout)).await
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, TransportError> {
        Self::send(self.prepare(self.client.get(url), timeout)).await
    }
}

fn network_error(error: reqwest::Error) -> TransportError {
    let mut detail = error.to_string();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    TransportError::Network(detail)
}

/// Extract the `message` field of an error body.
///
/// JSON without a usable message yields a generic text; anything else is
/// reported raw, truncated.
pub fn parse_error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(payload) => match payload.get("message") {
            Some(serde_json::Value::String(message)) => normalize_text_option(Some(message.clone()))
                .unwrap_or_else(|| UNKNOWN_SERVER_ERROR.to_string()),
            Some(serde_json::Value::Null) | None => UNKNOWN_SERVER_ERROR.to_string(),
            Some(other) => other.to_string(),
        },
        Err(_) => format!(
            "Server error (raw): {}",
            truncate_chars(body, RAW_ERROR_PREVIEW_CHARS)
        ),
    }
}
