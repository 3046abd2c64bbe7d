//! IPC server behavior: framing, rate limiting, failure isolation, shutdown

use cortexd::ipc::protocol::{Request, RequestKind};
use serde_json::json;
use tokio::net::UnixStream;

use crate::helpers::{ScriptedSampler, TestDaemon};

#[tokio::test]
async fn ping_and_version_round_trip() {
    let daemon = TestDaemon::start(json!({}), ScriptedSampler::cpu([])).await;
    let mut client = daemon.connect().await;

    let response = client.request_kind(RequestKind::Ping).await;
    assert!(response.ok);
    assert_eq!(response.payload.unwrap(), json!({"pong": true}));

    let response = client.request_kind(RequestKind::Version).await;
    assert!(response.ok);
    assert_eq!(
        response.payload.unwrap()["version"],
        json!(env!("CARGO_PKG_VERSION"))
    );

    daemon.stop().await;
}

#[tokio::test]
async fn malformed_input_gets_a_response_and_keeps_the_connection() {
    let daemon = TestDaemon::start(json!({}), ScriptedSampler::cpu([])).await;
    let mut client = daemon.connect().await;

    let response = client.send_raw("this is not json").await;
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("malformed request"));

    // Unknown kinds are protocol errors too.
    let response = client.send_raw(r#"{"kind": "packages.install"}"#).await;
    assert!(!response.ok);

    // The same connection still serves valid requests afterwards.
    let response = client.request_kind(RequestKind::Ping).await;
    assert!(response.ok);

    daemon.stop().await;
}

#[tokio::test]
async fn responses_arrive_in_request_order() {
    let daemon = TestDaemon::start(json!({}), ScriptedSampler::cpu([])).await;
    let mut client = daemon.connect().await;

    for _ in 0..3 {
        let ping = client.request_kind(RequestKind::Ping).await;
        assert!(ping.ok);
        let version = client.request_kind(RequestKind::Version).await;
        assert!(version.ok);
        assert!(version.payload.unwrap().get("version").is_some());
    }

    daemon.stop().await;
}

#[tokio::test]
async fn connections_are_served_concurrently() {
    let daemon = TestDaemon::start(json!({}), ScriptedSampler::cpu([])).await;

    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(daemon.connect().await);
    }

    let responses = futures::future::join_all(
        clients
            .iter_mut()
            .map(|client| client.request_kind(RequestKind::Ping)),
    )
    .await;

    assert!(responses.iter().all(|response| response.ok));

    daemon.stop().await;
}

#[tokio::test]
async fn requests_over_budget_are_rejected_not_dropped() {
    let budget = 5;
    let daemon = TestDaemon::start(
        json!({"rate_limit": {"max_requests_per_sec": budget}}),
        ScriptedSampler::cpu([]),
    )
    .await;
    let mut client = daemon.connect().await;

    // budget + 1 rapid requests: every one gets a response, and at least one
    // is a rejection.
    let mut accepted = 0;
    let mut rejected = 0;
    for _ in 0..budget + 1 {
        let response = client.request_kind(RequestKind::Ping).await;
        if response.ok {
            accepted += 1;
        } else {
            assert_eq!(response.error.as_deref(), Some("rate limit exceeded"));
            rejected += 1;
        }
    }

    assert_eq!(accepted + rejected, budget + 1, "no request may go unanswered");
    assert!(rejected >= 1);
    assert!(accepted <= budget);

    daemon.stop().await;
}

#[tokio::test]
async fn health_get_reports_unknown_before_the_first_tick() {
    let daemon = TestDaemon::start(json!({}), ScriptedSampler::cpu([70.0])).await;
    let mut client = daemon.connect().await;

    let response = client.request_kind(RequestKind::HealthGet).await;
    assert!(response.ok);
    let health = response.payload.unwrap();
    assert_eq!(health["cpu"]["status"], json!("unknown"));
    assert_eq!(health["sampled_at"], json!(null));

    daemon.tick(1).await;

    let response = client.request_kind(RequestKind::HealthGet).await;
    let health = response.payload.unwrap();
    assert_eq!(health["cpu"]["status"], json!("ok"));
    assert_eq!(health["cpu"]["value"], json!(70.0));
    assert!(health["sampled_at"].is_string());

    daemon.stop().await;
}

#[tokio::test]
async fn shutdown_request_stops_the_daemon_cleanly() {
    let daemon = TestDaemon::start(json!({}), ScriptedSampler::cpu([])).await;
    let mut client = daemon.connect().await;

    // The shutdown request itself is answered before the server goes down.
    let response = client.request_kind(RequestKind::Shutdown).await;
    assert!(response.ok);

    let socket_path = daemon.socket_path.clone();
    let monitor = daemon.monitor.clone();

    // Wait for the accept loop to drain and the actors to stop.
    daemon.server.await.unwrap().unwrap();
    daemon.monitor.shutdown().await;
    daemon.alerts.shutdown().await;

    // The sampling loop is fully stopped: a repeated shutdown returns
    // immediately instead of hanging on a live task.
    monitor.shutdown().await;

    // A new connection to the old endpoint fails cleanly.
    assert!(UnixStream::connect(&socket_path).await.is_err());
}

#[tokio::test]
async fn slow_client_does_not_block_others() {
    let daemon = TestDaemon::start(
        json!({"socket": {"timeout_ms": 200}}),
        ScriptedSampler::cpu([]),
    )
    .await;

    // This client connects and then just sits there.
    let idle = daemon.connect().await;

    let mut active = daemon.connect().await;
    for _ in 0..3 {
        let response = active.request_kind(RequestKind::Ping).await;
        assert!(response.ok);
    }

    // The idle connection gets closed by the read timeout eventually; the
    // active one keeps working either way.
    drop(idle);
    let response = active.request_kind(RequestKind::Ping).await;
    assert!(response.ok);

    daemon.stop().await;
}

#[tokio::test]
async fn acknowledge_with_a_string_id_is_a_payload_error() {
    let daemon = TestDaemon::start(json!({}), ScriptedSampler::cpu([])).await;
    let mut client = daemon.connect().await;

    let response = client
        .request(Request::with_payload(
            RequestKind::AlertsAcknowledge,
            json!({"id": "one"}),
        ))
        .await;
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("alert id"));

    daemon.stop().await;
}
