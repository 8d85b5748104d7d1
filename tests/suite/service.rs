//! Reading service over real sockets: routing, validation, upstream errors.

use futures_util::StreamExt;
use serde_json::{Value, json};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    TEST_MODEL, endpoint, mount_gemini_error, mount_gemini_stream, start_service,
};

fn valid_body() -> Value {
    json!({
        "question": "Will the move go well?",
        "past": "6. The Lovers",
        "present": "Knight of Pentacles",
        "future": "17. The Star",
        "past_reverse": false,
        "present_reverse": false,
        "future_reverse": true
    })
}

async fn post(url: &str, body: String) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap()
}

/// Backend that fails the test if the service ever calls it.
async fn untouchable_backend() -> MockServer {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;
    backend
}

#[tokio::test]
async fn health_check_names_the_model() {
    let backend = untouchable_backend().await;
    let addr = start_service(&backend).await;

    let response = reqwest::get(format!("http://{addr}/api")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ready", "model": TEST_MODEL }));
}

#[tokio::test]
async fn empty_question_is_rejected() {
    let backend = untouchable_backend().await;
    let addr = start_service(&backend).await;

    let mut body = valid_body();
    body["question"] = json!("");
    let response = post(&endpoint(addr), body.to_string()).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Invalid fields: question must be a non-empty string"
    );
}

#[tokio::test]
async fn missing_orientation_is_rejected() {
    let backend = untouchable_backend().await;
    let addr = start_service(&backend).await;

    let mut body = valid_body();
    body.as_object_mut().unwrap().remove("future_reverse");
    let response = post(&endpoint(addr), body.to_string()).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing required fields: future_reverse");
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let backend = untouchable_backend().await;
    let addr = start_service(&backend).await;

    let response = post(&endpoint(addr), "{\"question\": ".to_string()).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn reading_streams_as_plain_text() {
    let backend = MockServer::start().await;
    mount_gemini_stream(&backend, &["## Past Interpretation\n", "The Lovers ", "speak of a choice."]).await;
    let addr = start_service(&backend).await;

    let response = post(&endpoint(addr), valid_body().to_string()).await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );

    let mut text = Vec::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        text.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(
        String::from_utf8(text).unwrap(),
        "## Past Interpretation\nThe Lovers speak of a choice."
    );
}

#[tokio::test]
async fn upstream_failure_is_a_500_with_details() {
    let backend = MockServer::start().await;
    mount_gemini_error(&backend, 500, r#"{"error":{"message":"overloaded"}}"#).await;
    let addr = start_service(&backend).await;

    let response = post(&endpoint(addr), valid_body().to_string()).await;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Failed to generate reading");
    let details = body["details"].as_str().unwrap();
    assert!(details.starts_with("API error 500"), "{details}");
    assert!(details.contains("overloaded"), "{details}");
}
