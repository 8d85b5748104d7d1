use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Value, json};

use crate::{
    ApiConfig, GenerateRequest, Result, StreamEvent, client_for, mpsc, retry, reject_upstream,
    sse::SseFramer, sse_types::gemini as typed,
};

const MAX_OUTPUT_TOKENS: u32 = 8192;
/// Consecutive unparseable payloads tolerated before giving up.
const MAX_PARSE_ERRORS: usize = 3;

/// Build the `streamGenerateContent` body.
///
/// Gemini mixes casing: `system_instruction`, `contents`, `generationConfig`.
fn build_request_body(request: &GenerateRequest<'_>) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        "generationConfig": {
            "maxOutputTokens": MAX_OUTPUT_TOKENS,
            "temperature": 1.0,
        },
    });

    if let Some(system) = request.system_instruction.filter(|s| !s.trim().is_empty()) {
        body["system_instruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

/// Events carried by one SSE payload. A terminal event, if any, is last.
fn parse_chunk(payload: &Value) -> Vec<StreamEvent> {
    let response: typed::Response = match serde_json::from_value(payload.clone()) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(%e, "Unexpected Gemini payload shape");
            return Vec::new();
        }
    };

    if let Some(error) = response.error {
        return vec![StreamEvent::Error(error.message_or_default().to_string())];
    }
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return vec![StreamEvent::Error(format!("Prompt blocked: {reason}"))];
    }

    let mut events = Vec::new();
    let mut terminal = None;
    for candidate in response.candidates.into_iter().flatten() {
        // Text before finishReason: the final chunk usually carries both.
        let texts = candidate
            .content
            .and_then(|content| content.parts)
            .into_iter()
            .flatten()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .filter(|text| !text.is_empty());
        events.extend(texts.map(StreamEvent::TextDelta));

        match candidate.finish_reason.as_deref().map(typed::classify_finish) {
            Some(typed::FinishKind::Complete) => terminal = Some(StreamEvent::Done),
            Some(typed::FinishKind::Withheld(msg)) => {
                terminal = Some(StreamEvent::Error(msg.to_string()));
            }
            Some(typed::FinishKind::Unrecognized) | None => {}
        }
    }
    events.extend(terminal);
    events
}

/// Forward the SSE body as stream events until a terminal event is sent or
/// the receiver goes away. A read failure is returned as an error; the idle
/// timeout and framing failures are sent as `StreamEvent::Error`.
async fn pump(
    response: reqwest::Response,
    tx: &mpsc::Sender<StreamEvent>,
    idle_timeout: Duration,
) -> Result<()> {
    let mut body = response.bytes_stream();
    let mut framer = SseFramer::new();
    let mut parse_errors = 0usize;

    loop {
        let Ok(next) = tokio::time::timeout(idle_timeout, body.next()).await else {
            let _ = tx.send(StreamEvent::Error("Stream idle timeout".into())).await;
            return Ok(());
        };
        let Some(bytes) = next else { break };

        if let Err(e) = framer.push(&bytes?) {
            let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            return Ok(());
        }

        while let Some(data) = framer.next_data() {
            let data = match data {
                Ok(data) => data,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    return Ok(());
                }
            };

            let payload = match serde_json::from_str::<Value>(&data) {
                Ok(payload) => payload,
                Err(e) => {
                    parse_errors += 1;
                    tracing::warn!(%e, payload_bytes = data.len(), "Invalid SSE JSON payload");
                    if parse_errors >= MAX_PARSE_ERRORS {
                        let message = format!("Invalid stream payload: {e}");
                        let _ = tx.send(StreamEvent::Error(message)).await;
                        return Ok(());
                    }
                    continue;
                }
            };
            parse_errors = 0;

            for event in parse_chunk(&payload) {
                let terminal = event.is_terminal();
                if tx.send(event).await.is_err() || terminal {
                    return Ok(());
                }
            }
        }
    }

    // A clean end of body finishes the reading even without a finish reason.
    tracing::debug!("Gemini stream ended without a finish reason");
    let _ = tx.send(StreamEvent::Done).await;
    Ok(())
}

pub async fn send_message(
    config: &ApiConfig,
    request: &GenerateRequest<'_>,
    tx: mpsc::Sender<StreamEvent>,
) -> Result<()> {
    let client = client_for(config.base_url());
    let base = config.base_url().trim_end_matches('/');
    let model = config.model();
    let url = format!("{base}/models/{model}:streamGenerateContent?alt=sse");
    let body = build_request_body(request);

    tracing::debug!(%model, "Requesting Gemini stream");
    let outcome = retry::send_with_retry(
        || {
            client
                .post(&url)
                .header("x-goog-api-key", config.api_key())
                .json(&body)
        },
        config.retry_config(),
    )
    .await;

    match reject_upstream(outcome).await {
        Ok(response) => pump(response, &tx, config.idle_timeout()).await,
        Err(message) => {
            let _ = tx.send(StreamEvent::Error(message)).await;
            Ok(())
        }
    }
}
