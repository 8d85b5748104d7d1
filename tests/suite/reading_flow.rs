//! Full readings: engine -> reading service -> mock Gemini, and broken streams.

use arcana_engine::{Phase, ReadingStatus, SlotLabel};
use wiremock::MockServer;

use crate::common::{
    StubEnd, endpoint, engine, finish_reading, mount_gemini_error, mount_gemini_stream,
    pick_three, reveal_all, start_service, start_stub_service, wait_for_text,
};

#[tokio::test]
async fn complete_reading_ends_revealed() {
    let backend = MockServer::start().await;
    mount_gemini_stream(
        &backend,
        &["**Past Interpretation**\n", "A door closed. ", "☆ A new one opens."],
    )
    .await;
    let addr = start_service(&backend).await;

    let mut engine = engine(&endpoint(addr));
    pick_three(&mut engine);
    reveal_all(&mut engine);
    finish_reading(&mut engine).await;

    let stream = engine.reading().unwrap();
    assert_eq!(stream.status(), &ReadingStatus::Done);
    assert_eq!(
        stream.text(),
        "**Past Interpretation**\nA door closed. ☆ A new one opens."
    );
    assert_eq!(engine.phase(), Phase::Revealed);
    for slot in SlotLabel::ALL {
        assert!(engine.reveal().is_revealed(slot));
    }
}

#[tokio::test]
async fn upstream_failure_reaches_the_engine_as_an_error() {
    let backend = MockServer::start().await;
    mount_gemini_error(&backend, 500, "upstream exploded").await;
    let addr = start_service(&backend).await;

    let mut engine = engine(&endpoint(addr));
    pick_three(&mut engine);
    reveal_all(&mut engine);
    finish_reading(&mut engine).await;

    let stream = engine.reading().unwrap();
    let message = stream.status().error_message().unwrap();
    assert!(
        message.starts_with("Failed to generate reading: API error 500"),
        "{message}"
    );
    assert!(stream.text().is_empty());
    assert_eq!(engine.phase(), Phase::Consulting);
}

#[tokio::test]
async fn broken_stream_keeps_partial_text() {
    let endpoint = start_stub_service(&["The Tower ", "falls"], StubEnd::Close).await;

    let mut engine = engine(&endpoint);
    pick_three(&mut engine);
    reveal_all(&mut engine);
    finish_reading(&mut engine).await;

    let stream = engine.reading().unwrap();
    let message = stream.status().error_message().unwrap();
    assert!(message.starts_with("reading stream broke"), "{message}");
    assert!("The Tower falls".starts_with(stream.text()));
    assert_eq!(engine.phase(), Phase::Consulting);
}

#[tokio::test]
async fn reset_mid_reading_cancels_the_stream() {
    let endpoint = start_stub_service(&["Three of Cups "], StubEnd::Hang).await;

    let mut engine = engine(&endpoint);
    pick_three(&mut engine);
    reveal_all(&mut engine);
    wait_for_text(&mut engine).await;

    let cancelled = engine.reset().unwrap();
    assert_eq!(cancelled.status(), &ReadingStatus::Cancelled);
    assert_eq!(cancelled.text(), "Three of Cups ");

    assert_eq!(engine.phase(), Phase::Initial);
    assert!(engine.reading().is_none());
    assert!(engine.selection().is_empty());

    engine.tick(std::time::Duration::from_millis(50));
    assert!(engine.reading().is_none());
    assert_eq!(engine.phase(), Phase::Initial);
}

#[tokio::test]
async fn engine_can_start_again_after_reset() {
    let backend = MockServer::start().await;
    mount_gemini_stream(&backend, &["Second reading."]).await;
    let addr = start_service(&backend).await;

    let mut engine = engine(&endpoint(addr));
    pick_three(&mut engine);
    assert!(engine.reset().is_none());

    pick_three(&mut engine);
    reveal_all(&mut engine);
    finish_reading(&mut engine).await;
    assert_eq!(engine.reading().unwrap().text(), "Second reading.");
    assert_eq!(engine.phase(), Phase::Revealed);
}
