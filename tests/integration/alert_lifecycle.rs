//! End-to-end alert lifecycle through monitor, alert actor, and IPC

use cortexd::alerts::AlertState;
use cortexd::ipc::protocol::{Request, RequestKind};
use cortexd::monitors::resources::Readings;
use serde_json::json;

use crate::helpers::{ScriptedSampler, TestDaemon};

fn tight_cpu_thresholds() -> serde_json::Value {
    json!({
        "monitoring": {
            "cpu": {"warning_threshold": 80.0, "critical_threshold": 95.0}
        }
    })
}

#[tokio::test]
async fn cpu_spike_produces_a_single_escalated_then_resolved_alert() {
    // Thresholds {warning: 80, critical: 95}, samples [70, 85, 97, 60]:
    // create(warning) at the second sample, escalate at the third, resolve at
    // the fourth.
    let sampler = ScriptedSampler::cpu([70.0, 85.0, 97.0, 60.0]);
    let daemon = TestDaemon::start(tight_cpu_thresholds(), sampler).await;
    let mut client = daemon.connect().await;

    daemon.tick(1).await;
    let response = client.request_kind(RequestKind::AlertsGet).await;
    assert!(response.ok);
    assert_eq!(response.payload.unwrap()["alerts"], json!([]));

    daemon.tick(1).await;
    let response = client.request_kind(RequestKind::AlertsGet).await;
    let alerts = response.payload.unwrap()["alerts"].clone();
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["severity"], json!("warning"));
    assert_eq!(alerts[0]["state"], json!("active"));
    let id = alerts[0]["id"].as_u64().unwrap();

    daemon.tick(1).await;
    let response = client.request_kind(RequestKind::AlertsGet).await;
    let alerts = response.payload.unwrap()["alerts"].clone();
    assert_eq!(
        alerts.as_array().unwrap().len(),
        1,
        "escalation must reuse the alert, not open a second one"
    );
    assert_eq!(alerts[0]["id"].as_u64(), Some(id));
    assert_eq!(alerts[0]["severity"], json!("critical"));

    daemon.tick(1).await;
    let response = client.request_kind(RequestKind::AlertsGet).await;
    let alerts = response.payload.unwrap()["alerts"].clone();
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["state"], json!("resolved"));

    daemon.stop().await;
}

#[tokio::test]
async fn acknowledge_and_dismiss_over_the_wire() {
    let sampler = ScriptedSampler::cpu([85.0]);
    let daemon = TestDaemon::start(tight_cpu_thresholds(), sampler).await;
    let mut client = daemon.connect().await;

    daemon.tick(1).await;

    let response = client
        .request(Request::with_payload(
            RequestKind::AlertsAcknowledge,
            json!({"id": 1}),
        ))
        .await;
    assert!(response.ok);
    assert_eq!(response.payload.unwrap()["state"], json!("acknowledged"));

    // Acknowledging twice is an invalid-state error, distinct from not-found.
    let response = client
        .request(Request::with_payload(
            RequestKind::AlertsAcknowledge,
            json!({"id": 1}),
        ))
        .await;
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("invalid state"));

    let response = client
        .request(Request::with_payload(
            RequestKind::AlertsAcknowledge,
            json!({"id": 999}),
        ))
        .await;
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("not found"));

    let response = client
        .request(Request::with_payload(
            RequestKind::AlertsDismiss,
            json!({"id": 1}),
        ))
        .await;
    assert!(response.ok);
    assert_eq!(response.payload.unwrap()["state"], json!("dismissed"));

    daemon.stop().await;
}

#[tokio::test]
async fn failed_cpu_read_does_not_disturb_other_resources_or_alerts() {
    let sampler = ScriptedSampler::new([
        // Memory crosses its default warning threshold (85) immediately.
        Readings {
            cpu: Some(50.0),
            memory: Some(90.0),
            disk: Some(10.0),
        },
        // The cpu read fails; memory keeps exceeding.
        Readings {
            cpu: None,
            memory: Some(91.0),
            disk: Some(10.0),
        },
    ]);
    let daemon = TestDaemon::start(json!({}), sampler).await;
    let mut client = daemon.connect().await;

    daemon.tick(2).await;

    let response = client.request_kind(RequestKind::HealthGet).await;
    let health = response.payload.unwrap();
    assert_eq!(health["cpu"]["status"], json!("unknown"));
    assert_eq!(health["memory"]["status"], json!("warning"));
    assert_eq!(health["disk"]["status"], json!("ok"));

    // The memory alert survives the cpu sampling failure untouched.
    let response = client
        .request(Request::with_payload(
            RequestKind::AlertsGet,
            json!({"state": "active"}),
        ))
        .await;
    let alerts = response.payload.unwrap()["alerts"].clone();
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["resource"], json!("memory"));

    daemon.stop().await;
}

#[tokio::test]
async fn concurrent_acknowledge_and_dismiss_from_two_clients() {
    let sampler = ScriptedSampler::cpu([97.0]);
    let daemon = TestDaemon::start(tight_cpu_thresholds(), sampler).await;

    daemon.tick(1).await;

    let mut first = daemon.connect().await;
    let mut second = daemon.connect().await;

    let (ack, dismiss) = tokio::join!(
        first.request(Request::with_payload(
            RequestKind::AlertsAcknowledge,
            json!({"id": 1}),
        )),
        second.request(Request::with_payload(
            RequestKind::AlertsDismiss,
            json!({"id": 1}),
        )),
    );

    // Dismiss is legal from active and acknowledged alike, so it must have
    // landed; acknowledge either preceded it or was told the alert is gone.
    assert!(dismiss.ok);
    if !ack.ok {
        assert!(ack.error.unwrap().contains("invalid state"));
    }

    // Every later observer sees the same terminal state.
    let mut third = daemon.connect().await;
    let response = third.request_kind(RequestKind::AlertsGet).await;
    let alerts = response.payload.unwrap()["alerts"].clone();
    assert_eq!(alerts[0]["state"], json!("dismissed"));

    daemon.stop().await;
}

#[tokio::test]
async fn alert_state_filter_roundtrips_over_the_wire() {
    let sampler = ScriptedSampler::new([
        Readings {
            cpu: Some(85.0),
            memory: Some(90.0),
            disk: Some(10.0),
        },
    ]);
    let daemon = TestDaemon::start(tight_cpu_thresholds(), sampler).await;
    let mut client = daemon.connect().await;

    daemon.tick(1).await;

    let acknowledged = daemon.alerts.acknowledge(1).await.unwrap();
    assert_eq!(acknowledged.unwrap().state, AlertState::Acknowledged);

    let response = client
        .request(Request::with_payload(
            RequestKind::AlertsGet,
            json!({"state": "active"}),
        ))
        .await;
    let alerts = response.payload.unwrap()["alerts"].clone();
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["id"], json!(2));

    let response = client
        .request(Request::with_payload(
            RequestKind::AlertsGet,
            json!({"state": "acknowledged"}),
        ))
        .await;
    let alerts = response.payload.unwrap()["alerts"].clone();
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["id"], json!(1));

    daemon.stop().await;
}
