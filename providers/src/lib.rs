//! Text-generation backend client with streaming support.
//!
//! # Architecture
//!
//! - [`send_message`] - entry point; streams one generation into a channel
//! - [`gemini`] - Google Gemini `streamGenerateContent` client
//! - [`sse`] - event framing for the backend body
//! - [`retry`] - backoff policy for the upstream request
//!
//! The client emits events through a [`tokio::sync::mpsc::Sender<StreamEvent>`]
//! channel, allowing the caller to forward text as it arrives.
//!
//! # Streaming Events
//!
//! | Event | Description |
//! |-------|-------------|
//! | `TextDelta` | Incremental text content from the model |
//! | `Done` | Stream completed successfully |
//! | `Error` | Stream terminated with an error |
//!
//! # Error Handling
//!
//! Provider/API errors during streaming are delivered as `StreamEvent::Error` events
//! rather than `Result::Err` returns, allowing partial output to be captured before the
//! error occurs. Low-level failures that prevent reading the HTTP response stream (e.g.
//! mid-stream I/O errors) may still return `Err`.

pub mod retry;
pub mod sse;
pub mod sse_types;

use std::sync::OnceLock;
use std::time::Duration;

use futures_util::StreamExt;

pub(crate) use anyhow::Result;
pub(crate) use arcana_types::{ApiKey, NonEmptyString, StreamEvent};
pub(crate) use tokio::sync::mpsc;

pub use arcana_types;

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Model used when configuration does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;

// reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Shared HTTPS-only client for remote backends.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| build_client(true))
}

/// Client for plain-HTTP loopback backends (local stubs, test doubles).
fn loopback_http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| build_client(false))
}

fn build_client(https_only: bool) -> reqwest::Client {
    base_client_builder()
        .https_only(https_only)
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build hardened HTTP client: {e}. Using defaults.");
            reqwest::Client::default()
        })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Pick the client for `base_url`: plain HTTP is only allowed to loopback hosts.
pub(crate) fn client_for(base_url: &str) -> &'static reqwest::Client {
    if is_loopback_http(base_url) {
        loopback_http_client()
    } else {
        http_client()
    }
}

fn is_loopback_http(base_url: &str) -> bool {
    let Ok(url) = url::Url::parse(base_url) else {
        return false;
    };
    if url.scheme() != "http" {
        return false;
    }
    match url.host() {
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

/// Idle timeout between backend events, overridable via
/// `ARCANA_STREAM_IDLE_TIMEOUT_SECS`.
pub fn stream_idle_timeout() -> Duration {
    static TIMEOUT: OnceLock<Duration> = OnceLock::new();
    *TIMEOUT.get_or_init(|| {
        let timeout = std::env::var("ARCANA_STREAM_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS);
        Duration::from_secs(timeout)
    })
}

/// Error body text, cut at 32 KiB.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(Ok(chunk)) = stream.next().await {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            return format!("{}...(truncated)", String::from_utf8_lossy(&body));
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// The streamable response, or the message describing why there is none.
pub(crate) async fn reject_upstream(
    outcome: retry::Upstream,
) -> Result<reqwest::Response, String> {
    let message = match outcome {
        retry::Upstream::Accepted(response) => return Ok(response),
        retry::Upstream::Refused(response) => {
            let status = response.status();
            let body = read_capped_error_body(response).await;
            format!("API error {status}: {body}")
        }
        retry::Upstream::Unreachable { attempts: 1, source } => {
            format!("Request failed: {source}")
        }
        retry::Upstream::Unreachable { attempts, source } => {
            format!("Request failed after {attempts} attempts: {source}")
        }
    };
    tracing::warn!(error = %message, "Upstream request failed");
    Err(message)
}

/// Backend credentials, model, and endpoint with transport tuning knobs.
///
/// ```rust
/// use arcana_providers::ApiConfig;
/// use arcana_types::ApiKey;
///
/// let config = ApiConfig::new(ApiKey::new("test").unwrap(), "gemini-2.5-flash")
///     .unwrap()
///     .with_base_url("http://127.0.0.1:9000/v1beta")
///     .unwrap();
/// assert_eq!(config.model(), "gemini-2.5-flash");
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    api_key: ApiKey,
    model: NonEmptyString,
    base_url: String,
    retry: retry::RetryConfig,
    idle_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiConfigError {
    #[error("model name must not be empty")]
    EmptyModel,
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ApiConfig {
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Result<Self, ApiConfigError> {
        let model = NonEmptyString::new(model.into().trim())
            .map_err(|_| ApiConfigError::EmptyModel)?;

        Ok(Self {
            api_key,
            model,
            base_url: GEMINI_API_BASE_URL.to_string(),
            retry: retry::RetryConfig::default(),
            idle_timeout: stream_idle_timeout(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ApiConfigError> {
        let base_url = base_url.into();
        let parsed = url::Url::parse(&base_url).map_err(|e| ApiConfigError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiConfigError::InvalidBaseUrl {
                url: base_url,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        self.base_url = base_url;
        Ok(self)
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: retry::RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.model.as_str()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn retry_config(&self) -> &retry::RetryConfig {
        &self.retry
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

/// One generation: optional system instruction plus a single user prompt.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub system_instruction: Option<&'a str>,
    pub prompt: &'a str,
}

/// Stream one generation into `tx`.
///
/// Exactly one terminal event (`Done` or `Error`) is sent unless the receiver
/// is dropped first.
pub async fn send_message(
    config: &ApiConfig,
    request: &GenerateRequest<'_>,
    tx: mpsc::Sender<StreamEvent>,
) -> Result<()> {
    gemini::send_message(config, request, tx).await
}

/// Google Gemini API implementation.
///
/// Communicates with `{base_url}/models/{model}:streamGenerateContent?alt=sse`.
/// Thought parts are dropped; only answer text is forwarded.
pub mod gemini;
