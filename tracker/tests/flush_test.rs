//! Integration tests for draining the durable event queue.
//!
//! The flush contract is all-or-nothing: a failure partway through leaves
//! the queue file untouched, so the next successful flush re-sends the
//! whole batch. These tests stage partial failures with wiremock and watch
//! the queue file across attempts.

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dxtrack::sender::{Sender, SenderConfig};
use dxtrack::store::{EventStore, StoreError};
use dxtrack::types::{Event, Metadata};

// =============================================================================
// Test Helpers
// =============================================================================

fn sample_event(name: &str) -> Event {
    let mut metadata = Metadata::new();
    metadata.insert("success".to_string(), true.into());
    Event::now(name, metadata)
}

fn store_in(dir: &TempDir) -> EventStore {
    EventStore::new(dir.path().join("events.json"))
}

fn sender_for(server: &MockServer) -> Sender {
    Sender::new(
        SenderConfig::new("token-123".to_string(), "octocat".to_string(), false)
            .with_api_url(format!("{}/events.track", server.uri())),
    )
}

async fn mock_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/events.track"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
        )
        .mount(server)
        .await;
}

async fn mock_rejecting(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/events.track"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"ok": false, "error": "service unavailable"}),
        ))
        .mount(server)
        .await;
}

// =============================================================================
// Fast paths
// =============================================================================

#[tokio::test]
async fn flush_on_absent_queue_is_noop() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mock_ok(&server).await;

    let sent = store_in(&dir).flush(&sender_for(&server)).await.unwrap();

    assert_eq!(sent, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn flush_on_empty_queue_is_noop() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("events.json"), "").unwrap();

    let server = MockServer::start().await;
    mock_ok(&server).await;

    let sent = store_in(&dir).flush(&sender_for(&server)).await.unwrap();

    assert_eq!(sent, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

// =============================================================================
// Successful drain
// =============================================================================

#[tokio::test]
async fn flush_sends_in_insertion_order_and_clears() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.save(&sample_event("cli.startup.result")).unwrap();
    store.save(&sample_event("cli.startup.time")).unwrap();
    store.save(&sample_event("cli.workflow.deploy")).unwrap();

    let server = MockServer::start().await;
    mock_ok(&server).await;

    let sent = store.flush(&sender_for(&server)).await.unwrap();
    assert_eq!(sent, 3);

    let requests = server.received_requests().await.unwrap();
    let names: Vec<String> = requests
        .iter()
        .map(|r| {
            let body: serde_json::Value = r.body_json().unwrap();
            body["name"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        names,
        vec!["cli.startup.result", "cli.startup.time", "cli.workflow.deploy"]
    );

    // Queue file is truncated, not removed.
    let contents = std::fs::read_to_string(dir.path().join("events.json")).unwrap();
    assert!(contents.is_empty());
}

// =============================================================================
// Partial failure
// =============================================================================

#[tokio::test]
async fn failed_flush_aborts_early_and_leaves_queue_untouched() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.save(&sample_event("cli.startup.result")).unwrap();
    store.save(&sample_event("cli.startup.time")).unwrap();
    store.save(&sample_event("cli.workflow.deploy")).unwrap();

    let before = std::fs::read_to_string(dir.path().join("events.json")).unwrap();

    let server = MockServer::start().await;

    // First delivery succeeds, the second is rejected by the server.
    Mock::given(method("POST"))
        .and(path("/events.track"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_rejecting(&server).await;

    let result = store.flush(&sender_for(&server)).await;
    assert!(matches!(result, Err(StoreError::Send(_))));

    // The third event was never attempted.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    // The queue file is byte-for-byte what it was before the flush.
    let after = std::fs::read_to_string(dir.path().join("events.json")).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn retry_after_failure_resends_the_whole_batch() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.save(&sample_event("cli.startup.result")).unwrap();
    store.save(&sample_event("cli.startup.time")).unwrap();
    store.save(&sample_event("cli.workflow.deploy")).unwrap();

    let server = MockServer::start().await;

    // Stage a failure at the second event.
    Mock::given(method("POST"))
        .and(path("/events.track"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mock_rejecting(&server).await;

    assert!(store.flush(&sender_for(&server)).await.is_err());

    // Next attempt succeeds fully: all three events go out again,
    // including the one that was already delivered once.
    server.reset().await;
    mock_ok(&server).await;

    let sent = store.flush(&sender_for(&server)).await.unwrap();
    assert_eq!(sent, 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    let contents = std::fs::read_to_string(dir.path().join("events.json")).unwrap();
    assert!(contents.is_empty());
}

// =============================================================================
// Transport failures
// =============================================================================

#[tokio::test]
async fn unreachable_endpoint_fails_flush_and_keeps_queue() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save(&sample_event("cli.startup.result")).unwrap();

    let sender = Sender::new(
        SenderConfig::new("token-123".to_string(), "octocat".to_string(), false)
            .with_api_url("http://127.0.0.1:9/events.track".to_string()),
    );

    let result = store.flush(&sender).await;
    assert!(matches!(result, Err(StoreError::Send(_))));
    assert_eq!(store.load().unwrap().len(), 1);
}
