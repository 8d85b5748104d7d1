//! Shared test utilities and fixtures
//!
//! A mock Gemini backend, an in-process reading service, a raw stub service
//! for broken streams, and helpers that drive an engine through a reading.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use arcana_engine::{Engine, EngineConfig, FanLayout, Phase, ReadingClient, Rect, SlotLabel};
use arcana_providers::ApiConfig;
use arcana_providers::retry::RetryConfig;
use arcana_server::Server;
use arcana_types::ApiKey;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_MODEL: &str = "gemini-test";

/// Shuffle and transfer length for engine-driven tests.
pub const FAST: Duration = Duration::from_millis(10);

const READING_TIMEOUT: Duration = Duration::from_secs(10);

/// Gemini `streamGenerateContent` SSE body; the last chunk carries `STOP`.
pub fn gemini_sse(chunks: &[&str]) -> String {
    let mut body = String::new();
    for (i, text) in chunks.iter().enumerate() {
        let mut candidate = serde_json::json!({
            "content": { "role": "model", "parts": [{ "text": text }] }
        });
        if i + 1 == chunks.len() {
            candidate["finishReason"] = "STOP".into();
        }
        let data = serde_json::json!({ "candidates": [candidate] });
        body.push_str(&format!("data: {data}\n\n"));
    }
    body
}

/// Mount a streaming Gemini response for the test model
pub async fn mount_gemini_stream(server: &MockServer, chunks: &[&str]) {
    Mock::given(method("POST"))
        .and(path_regex(r":streamGenerateContent$"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(gemini_sse(chunks)),
        )
        .mount(server)
        .await;
}

/// Mount a Gemini error response
pub async fn mount_gemini_error(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path_regex(r":streamGenerateContent$"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Start a reading service on an ephemeral port, backed by `backend`.
pub async fn start_service(backend: &MockServer) -> SocketAddr {
    let api = ApiConfig::new(ApiKey::new("test-key").unwrap(), TEST_MODEL)
        .unwrap()
        .with_base_url(format!("{}/v1beta", backend.uri()))
        .unwrap()
        .with_retry_config(RetryConfig::default().with_max_retries(0));
    let server = Server::bind("127.0.0.1:0", api).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

pub fn endpoint(addr: SocketAddr) -> String {
    format!("http://{addr}/api/threecard")
}

/// How the stub reading service ends its body.
#[derive(Debug, Clone, Copy)]
pub enum StubEnd {
    /// Drop the connection without the terminating chunk.
    Close,
    /// Keep the connection open without sending anything more.
    Hang,
}

/// A reading service that answers one request with a chunked body built
/// from `parts`, then ends it as `end` says.
pub async fn start_stub_service(parts: &[&str], end: StubEnd) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let parts: Vec<String> = parts.iter().map(|part| (*part).to_string()).collect();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        consume_request(&mut reader).await;

        let mut response = String::from(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nTransfer-Encoding: chunked\r\n\r\n",
        );
        for part in &parts {
            response.push_str(&format!("{:X}\r\n{part}\r\n", part.len()));
        }
        if write_half.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        let _ = write_half.flush().await;

        match end {
            StubEnd::Close => {}
            StubEnd::Hang => tokio::time::sleep(Duration::from_secs(60)).await,
        }
    });

    endpoint(addr)
}

async fn consume_request<R: AsyncBufRead + Unpin>(reader: &mut R) {
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    let mut body = vec![0u8; content_length];
    let _ = reader.read_exact(&mut body).await;
}

pub fn engine(endpoint: &str) -> Engine {
    let config = EngineConfig {
        shuffle_duration: FAST,
        transfer_duration: FAST,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(
        config,
        FanLayout::for_viewport(1280.0, 800.0),
        ReadingClient::new(endpoint),
    )
    .with_seed(7);
    engine.set_question("What should I focus on this month?");
    engine
}

/// Start, finish the shuffle, and fill all three slots.
pub fn pick_three(engine: &mut Engine) {
    assert!(engine.start());
    engine.tick(FAST * 2);
    for slot in SlotLabel::ALL {
        assert_eq!(engine.phase(), Phase::Selecting(slot));
        let id = engine.card_at_top().unwrap().id();
        let origin = engine.fan_card_geometry(id).unwrap();
        engine.activate_card(id, origin, Rect::default()).unwrap();
        engine.tick(FAST * 2);
        assert!(engine.selection().get(slot).is_some());
    }
    assert_eq!(engine.phase(), Phase::Revealing);
}

/// Signal every reveal; the last one starts the reading.
pub fn reveal_all(engine: &mut Engine) {
    let fired: Vec<bool> = SlotLabel::ALL
        .into_iter()
        .map(|slot| engine.slot_revealed(slot))
        .collect();
    assert_eq!(fired, [false, false, true]);
    assert_eq!(engine.phase(), Phase::Consulting);
}

/// Fold reading events in until the stream is terminal.
pub async fn finish_reading(engine: &mut Engine) {
    tokio::time::timeout(READING_TIMEOUT, async {
        while !engine.reading().is_some_and(|stream| stream.is_terminal()) {
            engine.wait_for_reading().await;
        }
    })
    .await
    .expect("reading did not finish");
}

/// Fold reading events in until some text has arrived.
pub async fn wait_for_text(engine: &mut Engine) {
    tokio::time::timeout(READING_TIMEOUT, async {
        while engine
            .reading()
            .is_some_and(|stream| stream.text().is_empty() && !stream.is_terminal())
        {
            engine.wait_for_reading().await;
        }
    })
    .await
    .expect("no reading text arrived");
}
