//! The reading service.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /api`, `GET /api/` | `200 {status: "ready", model}` |
//! | `POST /api/threecard` | `200` chunked `text/plain` reading, or `400`/`500` JSON error |
//! | `OPTIONS *` | `204` CORS preflight |
//! | anything else | `404 {error: "Not found"}` |
//!
//! Each connection carries one request and is closed after the response.

pub mod http;
pub mod prompt;

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use arcana_providers::{ApiConfig, GenerateRequest};
use arcana_types::{StreamEvent, ThreeCardRequest};

use crate::http::{
    LAST_CHUNK, Request, chunk, chunked_text_head, http_error, http_json, http_no_content,
    read_request,
};

const STREAM_EVENT_CHANNEL_CAPACITY: usize = 256;
const GENERATION_FAILED: &str = "Failed to generate reading";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
}

#[derive(Debug)]
struct ServerState {
    api: ApiConfig,
}

/// A bound, not yet running, reading service.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl Server {
    pub async fn bind(addr: &str, api: ApiConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            state: Arc::new(ServerState { api }),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the task is dropped or accepting fails.
    pub async fn run(self) -> Result<(), ServerError> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, model = self.state.api.model(), "Reading service listening");
        }
        loop {
            let (stream, peer) = self.listener.accept().await.map_err(ServerError::Accept)?;
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                handle_connection(stream, peer, &state).await;
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: &ServerState) {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request = match read_request(&mut reader).await {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(%peer, "Unreadable request: {e}");
            if let Some(status) = e.status() {
                let _ = write_all(&mut writer, &http_error(status, &capitalize(&e.to_string())))
                    .await;
            }
            return;
        }
    };

    let status = route(&request, state, &mut writer).await;
    tracing::info!(%peer, method = %request.method, path = %request.path, status, "Request");
    let _ = writer.shutdown().await;
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

async fn write_all<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Dispatch and write the response. Returns the status sent.
async fn route<W: AsyncWrite + Unpin>(request: &Request, state: &ServerState, writer: &mut W) -> u16 {
    let (status, response) = match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => (204, http_no_content()),
        ("GET", "/api" | "/api/") => (
            200,
            http_json(200, &json!({ "status": "ready", "model": state.api.model() })),
        ),
        ("POST", "/api/threecard") => return handle_reading(&request.body, state, writer).await,
        _ => (404, http_error(404, "Not found")),
    };
    let _ = write_all(writer, &response).await;
    status
}

/// Aborts the generation task when the handler returns, however it returns.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn spawn_generation(api: ApiConfig, prompt: String) -> (mpsc::Receiver<StreamEvent>, AbortOnDrop) {
    let (tx, rx) = mpsc::channel(STREAM_EVENT_CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        let request = GenerateRequest {
            system_instruction: Some(prompt::SYSTEM_INSTRUCTION),
            prompt: &prompt,
        };
        if let Err(e) = arcana_providers::send_message(&api, &request, tx.clone()).await {
            tracing::warn!("Generation request failed: {e}");
            let _ = tx.send(StreamEvent::Error(e.to_string())).await;
        }
    });
    (rx, AbortOnDrop(task))
}

async fn next_event(rx: &mut mpsc::Receiver<StreamEvent>) -> StreamEvent {
    rx.recv()
        .await
        .unwrap_or_else(|| StreamEvent::Error("generation ended without a result".to_string()))
}

/// Validate, then stream the reading.
///
/// The status line waits for the backend's first event so that a failure
/// before any text is still reported as a JSON `500`. A failure after text
/// was sent drops the connection without the terminating chunk.
async fn handle_reading<W: AsyncWrite + Unpin>(
    body: &[u8],
    state: &ServerState,
    writer: &mut W,
) -> u16 {
    let request = match ThreeCardRequest::from_body(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!("Rejected reading request: {e}");
            let _ = write_all(writer, &http_error(400, &e.to_string())).await;
            return 400;
        }
    };

    let (mut rx, _generation) = spawn_generation(state.api.clone(), prompt::build_prompt(&request));

    let mut event = next_event(&mut rx).await;
    if let StreamEvent::Error(details) = &event {
        tracing::warn!(%details, "Reading generation failed");
        let response = http_json(
            500,
            &json!({ "error": GENERATION_FAILED, "details": details }),
        );
        let _ = write_all(writer, &response).await;
        return 500;
    }

    if write_all(writer, &chunked_text_head(200)).await.is_err() {
        return 200;
    }

    loop {
        match event {
            StreamEvent::TextDelta(text) => {
                if !text.is_empty() && write_all(writer, &chunk(text.as_bytes())).await.is_err() {
                    tracing::debug!("Client went away mid-reading");
                    return 200;
                }
            }
            StreamEvent::Done => {
                let _ = write_all(writer, LAST_CHUNK).await;
                return 200;
            }
            StreamEvent::Error(details) => {
                tracing::warn!(%details, "Reading generation failed mid-stream");
                return 200;
            }
        }
        event = next_event(&mut rx).await;
    }
}
