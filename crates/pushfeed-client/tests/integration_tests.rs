//! Integration tests for pushfeed-client
//!
//! These tests spin up the in-process backend and talk to it over real
//! WebSocket and HTTP connections.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use pushfeed_client::channel::Channel;
use pushfeed_client::streaming::{abort_pair, StreamObserver};
use pushfeed_client::testing::{wait_for, MockBackend, StreamScript, TestServer};
use pushfeed_client::{BackoffConfig, ChannelState, StreamError, StreamStatus};
use pushfeed_core::{done_line, ClientMessage, Frame, StreamRecord};
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn create_test_server() -> (MockBackend, TestServer) {
    let backend = MockBackend::new();
    let server = TestServer::start(backend.router())
        .await
        .expect("Failed to start test server");
    (backend, server)
}

fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        base_delay_ms: 20,
        max_delay_ms: 100,
        max_attempts: 3,
        jitter_ms: 0,
    }
}

// =============================================================================
// Channel Tests
// =============================================================================

#[tokio::test]
async fn test_channel_subscribes_and_receives_frames() {
    let (backend, server) = create_test_server().await;
    let channel = Channel::websocket(server.channel_config("/ws").unwrap());
    let mut updates = channel.updates();

    channel.set_targets(["web-1", "db-1"]);
    channel.connect();

    assert!(
        wait_for(|| async { backend.subscriptions().len() == 1 }, TIMEOUT).await,
        "backend never received the subscription"
    );
    assert_eq!(
        backend.subscriptions(),
        vec![ClientMessage::subscribe(["db-1", "web-1"])]
    );
    assert!(channel.is_connected());

    backend.push_frame(&Frame::new("metrics", "web-1").with_field("cpu", 0.25));
    let frame = tokio::time::timeout(TIMEOUT, updates.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.get_f64("cpu"), Some(0.25));
    assert_eq!(channel.latest("web-1"), Some(frame));
}

#[tokio::test]
async fn test_channel_binary_frames() {
    let (backend, server) = create_test_server().await;
    let channel = Channel::websocket(server.channel_config("/ws").unwrap());
    let mut updates = channel.updates();

    channel.set_targets(["web-1"]);
    channel.connect();
    assert!(wait_for(|| async { backend.subscriptions().len() == 1 }, TIMEOUT).await);

    backend.push_binary(b"{\"type\":\"metrics\",\"target_id\":\"web-\xff\"}".to_vec());
    backend.push_binary(br#"{"type":"metrics","target_id":"web-1","cpu":0.5}"#.to_vec());

    let frame = tokio::time::timeout(TIMEOUT, updates.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.target_id.as_str(), "web-1");
    assert_eq!(frame.get_f64("cpu"), Some(0.5));
    assert_eq!(channel.dropped_frames(), 1);
    assert_eq!(channel.snapshot().len(), 1);
}

#[tokio::test]
async fn test_channel_numeric_server_id() {
    let (backend, server) = create_test_server().await;
    let channel = Channel::websocket(server.channel_config("/ws").unwrap());
    let mut updates = channel.updates();

    channel.set_targets(["42"]);
    channel.connect();
    assert!(wait_for(|| async { backend.subscriptions().len() == 1 }, TIMEOUT).await);

    backend.push_raw("garbage");
    backend.push_raw(r#"{"type":"status","server_id":42,"up":true}"#);
    let frame = tokio::time::timeout(TIMEOUT, updates.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(frame.target_id.as_str(), "42");
    assert_eq!(channel.latest("42").unwrap().get::<bool>("up"), Some(true));
    assert_eq!(channel.dropped_frames(), 1);
}

#[tokio::test]
async fn test_channel_resubscribes_after_server_disconnect() {
    let (backend, server) = create_test_server().await;
    let config = server.channel_config("/ws").unwrap().with_backoff(fast_backoff());
    let channel = Channel::websocket(config);

    channel.set_targets(["a", "b"]);
    channel.connect();
    assert!(wait_for(|| async { backend.subscriptions().len() == 1 }, TIMEOUT).await);

    backend.disconnect_all();
    assert!(
        wait_for(|| async { backend.subscriptions().len() == 2 }, TIMEOUT).await,
        "channel did not resubscribe after reconnect"
    );

    assert_eq!(backend.connections(), 2);
    assert_eq!(
        backend.subscriptions(),
        vec![
            ClientMessage::subscribe(["a", "b"]),
            ClientMessage::subscribe(["a", "b"])
        ]
    );
    assert!(channel.is_connected());
}

#[tokio::test]
async fn test_channel_gives_up_when_server_is_gone() {
    let (_backend, server) = create_test_server().await;
    let config = server.channel_config("/ws").unwrap().with_backoff(fast_backoff());
    server.shutdown().await;

    let channel = Channel::websocket(config);
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    channel.on_failure(move |err| sink.lock().push(err.clone()));

    channel.connect();
    let state = channel
        .wait_for_state(TIMEOUT, |s| s.is_closed())
        .await
        .expect("channel never gave up");

    assert_eq!(state, ChannelState::Closed);
    assert_eq!(failures.lock().len(), 1);
    assert!(channel.failure().is_some());
}

#[tokio::test]
async fn test_channel_set_targets_while_connected() {
    let (backend, server) = create_test_server().await;
    let channel = Channel::websocket(server.channel_config("/ws").unwrap());

    channel.connect();
    assert!(wait_for(|| async { backend.subscriptions().len() == 1 }, TIMEOUT).await);

    channel.set_targets(["z"]);
    assert!(wait_for(|| async { backend.subscriptions().len() == 2 }, TIMEOUT).await);
    assert_eq!(backend.subscriptions()[1], ClientMessage::subscribe(["z"]));
}

// =============================================================================
// Streaming Tests
// =============================================================================

#[tokio::test]
async fn test_stream_request_split_records() {
    let (backend, server) = create_test_server().await;
    backend.set_stream(StreamScript::chunks([
        "data: {\"content\":\"Hel",
        "lo\"}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\", world\"}}]}\n\n",
        "data: [DONE]\n\n",
    ]));

    let mut increments = Vec::new();
    let mut completed = None;
    let outcome = server
        .client
        .stream_request(
            "/v1/stream",
            &json!({ "prompt": "hi" }),
            |delta, text| increments.push((delta.to_string(), text.to_string())),
            |text| completed = Some(text.to_string()),
            |err, _| panic!("unexpected stream error: {}", err),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.text, "Hello, world");
    assert_eq!(
        increments,
        vec![
            ("Hello".to_string(), "Hello".to_string()),
            (", world".to_string(), "Hello, world".to_string()),
        ]
    );
    assert_eq!(completed.as_deref(), Some("Hello, world"));
    assert_eq!(backend.stream_requests(), vec![json!({ "prompt": "hi" })]);
}

#[tokio::test]
async fn test_stream_request_skips_malformed_record() {
    let (backend, server) = create_test_server().await;
    let body = format!(
        "data: {{not json\n\n{}{}",
        StreamRecord::text("ok").to_line(),
        done_line()
    );
    backend.set_stream(StreamScript::chunks([body]));

    let outcome = server
        .client
        .stream_request("/v1/stream", &json!({}), |_, _| {}, |_| {}, |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.text, "ok");
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn test_stream_request_mid_stream_failure() {
    let (backend, server) = create_test_server().await;
    backend.set_stream(
        StreamScript::chunks([
            StreamRecord::text("par").to_line(),
            StreamRecord::text("tial").to_line(),
        ])
        .failing(),
    );

    let mut errors = Vec::new();
    let outcome = server
        .client
        .stream_request(
            "/v1/stream",
            &json!({}),
            |_, _| {},
            |_| panic!("stream must not complete"),
            |_, partial| errors.push(partial.to_string()),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, StreamStatus::Errored);
    assert_eq!(outcome.text, "partial");
    assert!(matches!(outcome.error, Some(StreamError::Transport(_))));
    assert_eq!(errors, vec!["partial".to_string()]);
}

#[tokio::test]
async fn test_stream_request_server_error() {
    let (backend, server) = create_test_server().await;
    backend.set_stream(StreamScript::error(
        StatusCode::SERVICE_UNAVAILABLE,
        "model overloaded",
    ));

    let result = server
        .client
        .stream_request("/v1/stream", &json!({}), |_, _| {}, |_| {}, |_, _| {})
        .await;

    match result {
        Err(StreamError::Server { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "model overloaded");
        }
        other => panic!("expected server error, got {:?}", other),
    }
}

#[derive(Default)]
struct Collect {
    text: String,
}

impl StreamObserver for Collect {
    fn on_increment(&mut self, _delta: &str, accumulated: &str) {
        self.text = accumulated.to_string();
    }
}

#[tokio::test]
async fn test_stream_abort() {
    let (backend, server) = create_test_server().await;
    let mut script = StreamScript::chunks([
        StreamRecord::text("one ").to_line(),
        StreamRecord::text("two ").to_line(),
        StreamRecord::text("three").to_line(),
        done_line(),
    ]);
    script.chunk_delay = Duration::from_millis(200);
    backend.set_stream(script);

    let (handle, signal) = abort_pair();
    let client = server.client.clone();
    let reader = tokio::spawn(async move {
        let mut observer = Collect::default();
        let outcome = client
            .stream_with("/v1/stream", &json!({}), &mut observer, Some(signal))
            .await
            .unwrap();
        (outcome, observer.text)
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    let (outcome, seen) = tokio::time::timeout(TIMEOUT, reader).await.unwrap().unwrap();
    assert_eq!(outcome.status, StreamStatus::Cancelled);
    assert_eq!(outcome.text, seen);
    assert!(!outcome.text.contains("three"));
}
