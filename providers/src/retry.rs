//! Backoff for the upstream generation request.
//!
//! Connection failures and 408/409/429/5xx responses are retried up to
//! `max_retries` times. Delays double from `initial_delay` up to `max_delay`,
//! shortened by a random down-jitter. A `Retry-After` under a minute replaces
//! the computed delay.
//!
//! Only the service's upstream call retries. The reading consumer never does.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};

const RETRY_AFTER_CEILING: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Largest fraction shaved off a delay (0.25 keeps 75%..100%).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Exponential delay before retry number `retry` (0-based), jitter applied.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let uncapped = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        let capped = uncapped.min(self.max_delay.as_secs_f64());
        let keep = 1.0 - rand::random::<f64>() * self.jitter_factor.clamp(0.0, 1.0);
        Duration::from_secs_f64(capped * keep)
    }
}

/// Server-requested wait in whole seconds, honoured only in `(0, 60s)`.
#[must_use]
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
        .filter(|wait| !wait.is_zero() && *wait < RETRY_AFTER_CEILING)
}

#[must_use]
pub fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::CONFLICT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn is_transient_transport(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

/// Final result of a retried request.
///
/// An error response is kept apart from a success so it can never be streamed
/// as a reading.
#[derive(Debug)]
pub enum Upstream {
    /// 2xx.
    Accepted(Response),
    /// Non-2xx that was not transient, or the last one allowed.
    Refused(Response),
    /// No response at all.
    Unreachable { attempts: u32, source: reqwest::Error },
}

/// Send the request built by `build`, retrying transient failures.
pub async fn send_with_retry<F>(build: F, config: &RetryConfig) -> Upstream
where
    F: Fn() -> RequestBuilder,
{
    let mut retry = 0;
    loop {
        let may_retry = retry < config.max_retries;

        let wait = match build().send().await {
            Ok(response) if response.status().is_success() => {
                return Upstream::Accepted(response);
            }
            Ok(response) => {
                let status = response.status();
                if !may_retry || !is_transient(status) {
                    return Upstream::Refused(response);
                }
                let wait = retry_after(response.headers()).unwrap_or_else(|| config.backoff(retry));
                tracing::debug!(%status, retry = retry + 1, wait_ms = wait.as_millis(), "Retrying upstream");
                wait
            }
            Err(source) => {
                if !may_retry || !is_transient_transport(&source) {
                    return Upstream::Unreachable {
                        attempts: retry + 1,
                        source,
                    };
                }
                let wait = config.backoff(retry);
                tracing::debug!(error = %source, retry = retry + 1, wait_ms = wait.as_millis(), "Retrying upstream");
                wait
            }
        };

        tokio::time::sleep(wait).await;
        retry += 1;
    }
}
