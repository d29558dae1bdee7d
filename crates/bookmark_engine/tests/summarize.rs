use std::time::Duration;

use bookmark_engine::{
    GenerationOptions, OllamaSummarizer, SummarizeError, Summarizer, SummarizerConfig,
};
use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn summarizer(server: &MockServer) -> OllamaSummarizer {
    OllamaSummarizer::new(SummarizerConfig {
        base_url: server.uri(),
        ..SummarizerConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn blocking_generation_strips_end_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "mistral:latest", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "A short summary.</s>",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = summarizer(&server).complete("Summarise this").await.unwrap();
    assert_eq!(text, "A short summary.");
}

#[tokio::test]
async fn request_carries_system_prompt_and_options() {
    let dir = tempfile::TempDir::new().unwrap();
    let prompt_path = dir.path().join("system.txt");
    std::fs::write(&prompt_path, "You are terse.").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3",
            "system": "You are terse.",
            "prompt": "hello",
            "options": { "temperature": 0.5, "num_ctx": 4096 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "ok",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summarizer = OllamaSummarizer::new(SummarizerConfig {
        base_url: server.uri(),
        model: "llama3".into(),
        system_prompt_path: Some(prompt_path),
        options: GenerationOptions {
            temperature: Some(0.5),
            context_length: Some(4096),
            ..GenerationOptions::default()
        },
        ..SummarizerConfig::default()
    })
    .unwrap();

    assert_eq!(summarizer.system_prompt(), "You are terse.");
    assert_eq!(summarizer.complete("hello").await.unwrap(), "ok");
}

#[tokio::test]
async fn server_error_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let err = summarizer(&server).complete("x").await.unwrap_err();
    match err {
        SummarizeError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model not loaded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn error_object_in_body_is_a_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": "model 'x' not found" })),
        )
        .mount(&server)
        .await;

    let err = summarizer(&server).complete("x").await.unwrap_err();
    assert!(matches!(err, SummarizeError::Backend(message) if message.contains("not found")));
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({ "response": "late", "done": true })),
        )
        .mount(&server)
        .await;

    let summarizer = OllamaSummarizer::new(SummarizerConfig {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..SummarizerConfig::default()
    })
    .unwrap();

    let err = summarizer.complete("x").await.unwrap_err();
    assert!(matches!(err, SummarizeError::Timeout { .. }));
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    // Bind then drop a listener so the port is closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let summarizer = OllamaSummarizer::new(SummarizerConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        ..SummarizerConfig::default()
    })
    .unwrap();

    let err = summarizer.complete("x").await.unwrap_err();
    assert!(matches!(err, SummarizeError::Unavailable { .. }));
}

#[tokio::test]
async fn streaming_yields_cleaned_fragments_in_order() {
    let body = [
        json!({ "response": "Rust ", "done": false }),
        json!({ "response": "", "done": false }),
        json!({ "response": "is fast</s>", "done": false }),
        json!({ "response": "", "done": true }),
    ]
    .iter()
    .map(|line| format!("{line}\n"))
    .collect::<String>();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let fragments = summarizer(&server)
        .complete_streaming("x")
        .await
        .unwrap()
        .map(|fragment| fragment.unwrap())
        .collect::<Vec<_>>()
        .await;

    assert_eq!(fragments, vec!["Rust ".to_string(), "is fast".to_string()]);
}

#[tokio::test]
async fn streaming_error_line_ends_the_stream() {
    let body = format!(
        "{}\n{}\n{}\n",
        json!({ "response": "partial", "done": false }),
        json!({ "error": "out of memory" }),
        json!({ "response": "never seen", "done": false }),
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let items = summarizer(&server)
        .complete_streaming("x")
        .await
        .unwrap()
        .collect::<Vec<_>>()
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "partial");
    assert!(matches!(&items[1], Err(SummarizeError::Backend(message)) if message == "out of memory"));
}

#[tokio::test]
async fn body_closing_before_done_is_an_error() {
    let body = format!("{}\n", json!({ "response": "Partial sum", "done": false }));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let items = summarizer(&server)
        .complete_streaming("x")
        .await
        .unwrap()
        .collect::<Vec<_>>()
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "Partial sum");
    assert!(matches!(
        &items[1],
        Err(SummarizeError::Backend(message)) if message.contains("before completion")
    ));
}
