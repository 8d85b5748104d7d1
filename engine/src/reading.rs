//! Streaming reading consumer.
//!
//! [`ReadingStream`] is the pure state: status plus accumulated text, driven by
//! explicit `on_chunk`/`on_done`/`on_error`/`cancel` calls. [`ReadingClient`]
//! issues the request on a background task and hands back an
//! [`ActiveReading`] that feeds the task's events into a `ReadingStream`.

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::mpsc;

use arcana_types::ThreeCardRequest;

const READING_EVENT_CHANNEL_CAPACITY: usize = 256;
const CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadingStatus {
    /// No byte received yet.
    #[default]
    Pending,
    Streaming,
    Done,
    Error {
        message: String,
    },
    /// Aborted by the consumer. Carries no user-facing message.
    Cancelled,
}

impl ReadingStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. } | Self::Cancelled)
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }
}

/// Accumulated reading text and stream status.
///
/// Text only grows, and only while the status is non-terminal. Bytes are
/// decoded incrementally: a character split across chunks is held back until
/// its remaining bytes arrive.
#[derive(Debug, Clone, Default)]
pub struct ReadingStream {
    status: ReadingStatus,
    text: String,
    partial: Vec<u8>,
}

impl ReadingStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> &ReadingStatus {
        &self.status
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn on_chunk(&mut self, bytes: &[u8]) {
        if self.is_terminal() || bytes.is_empty() {
            return;
        }
        self.status = ReadingStatus::Streaming;

        self.partial.extend_from_slice(bytes);
        let (valid_up_to, invalid) = match std::str::from_utf8(&self.partial) {
            Ok(text) => (text.len(), false),
            Err(e) => (e.valid_up_to(), e.error_len().is_some()),
        };

        let rest = self.partial.split_off(valid_up_to);
        let decoded = std::mem::replace(&mut self.partial, rest);
        // The prefix up to `valid_up_to` was just validated.
        self.text.push_str(&String::from_utf8_lossy(&decoded));

        if invalid {
            self.fail("reading contained invalid UTF-8");
        }
    }

    pub fn on_done(&mut self) {
        if self.is_terminal() {
            return;
        }
        if !self.partial.is_empty() {
            self.fail("reading ended in the middle of a character");
            return;
        }
        self.status = ReadingStatus::Done;
    }

    pub fn on_error(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.fail(message);
    }

    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.partial.clear();
        self.status = ReadingStatus::Cancelled;
    }

    fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "Reading failed");
        self.partial.clear();
        self.status = ReadingStatus::Error { message };
    }
}

/// Events from the background request task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadingEvent {
    Chunk(Vec<u8>),
    Done,
    Error(String),
}

/// Issues reading requests against the reading service.
#[derive(Debug, Clone)]
pub struct ReadingClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ReadingClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build reading HTTP client: {e}. Using defaults.");
                reqwest::Client::default()
            });
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Spawn the request on the current tokio runtime.
    ///
    /// Without a runtime the returned reading is already in the error state.
    #[must_use]
    pub fn start(&self, request: ThreeCardRequest) -> ActiveReading {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return ActiveReading::failed("cannot start reading: no async runtime");
        };

        let (tx, rx) = mpsc::channel(READING_EVENT_CHANNEL_CAPACITY);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        let reading = ActiveReading {
            stream: ReadingStream::new(),
            rx,
            abort_handle,
        };

        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        tracing::debug!(%endpoint, "Requesting reading");
        let task = fetch_reading(http, endpoint, request, tx);
        runtime.spawn(async move {
            let _ = Abortable::new(task, abort_registration).await;
        });

        reading
    }
}

async fn fetch_reading(
    http: reqwest::Client,
    endpoint: String,
    request: ThreeCardRequest,
    tx: mpsc::Sender<ReadingEvent>,
) {
    let response = match http.post(&endpoint).json(&request).send().await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx
                .send(ReadingEvent::Error(format!("request failed: {e}")))
                .await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = arcana_providers::read_capped_error_body(response).await;
        let _ = tx
            .send(ReadingEvent::Error(error_message(status, &body)))
            .await;
        return;
    }

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let event = match chunk {
            Ok(bytes) => ReadingEvent::Chunk(bytes.to_vec()),
            Err(e) => ReadingEvent::Error(format!("reading stream broke: {e}")),
        };
        let failed = matches!(event, ReadingEvent::Error(_));
        if tx.send(event).await.is_err() || failed {
            return;
        }
    }

    let _ = tx.send(ReadingEvent::Done).await;
}

/// Prefer the service's `{error, details}` body; fall back to raw text.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|value| value.get(name))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
    };

    match (field("error"), field("details")) {
        (Some(error), Some(details)) => format!("{error}: {details}"),
        (Some(error), None) => error,
        _ if body.trim().is_empty() => format!("HTTP {status}"),
        _ => format!("HTTP {status}: {}", body.trim()),
    }
}

/// A reading in flight: the background task plus the stream it feeds.
#[derive(Debug)]
pub struct ActiveReading {
    stream: ReadingStream,
    rx: mpsc::Receiver<ReadingEvent>,
    abort_handle: AbortHandle,
}

impl ActiveReading {
    /// A reading that never got a request off the ground.
    pub(crate) fn failed(message: &str) -> Self {
        let (_, rx) = mpsc::channel(1);
        let (abort_handle, _) = AbortHandle::new_pair();
        let mut stream = ReadingStream::new();
        stream.on_error(message);
        Self {
            stream,
            rx,
            abort_handle,
        }
    }

    #[must_use]
    pub fn stream(&self) -> &ReadingStream {
        &self.stream
    }

    #[must_use]
    pub fn into_stream(mut self) -> ReadingStream {
        std::mem::take(&mut self.stream)
    }

    /// Apply every event already queued. Returns `true` if anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while !self.stream.is_terminal() {
            let event = match self.rx.try_recv() {
                Ok(event) => event,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    tracing::warn!("Reading channel disconnected");
                    ReadingEvent::Error("reading stream disconnected".to_string())
                }
            };
            self.apply(event);
            changed = true;
        }
        changed
    }

    /// Wait for the next event and apply it. Returns immediately once terminal.
    pub async fn next_event(&mut self) {
        if self.stream.is_terminal() {
            return;
        }
        let event = self
            .rx
            .recv()
            .await
            .unwrap_or_else(|| ReadingEvent::Error("reading stream disconnected".to_string()));
        self.apply(event);
    }

    fn apply(&mut self, event: ReadingEvent) {
        match event {
            ReadingEvent::Chunk(bytes) => self.stream.on_chunk(&bytes),
            ReadingEvent::Done => self.stream.on_done(),
            ReadingEvent::Error(message) => self.stream.on_error(message),
        }
        if self.stream.is_terminal() {
            self.abort_handle.abort();
        }
    }

    /// Abort the request. No further chunk reaches the stream.
    pub fn cancel(&mut self) {
        self.abort_handle.abort();
        self.rx.close();
        self.stream.cancel();
    }
}

impl Drop for ActiveReading {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}
