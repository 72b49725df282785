//! End-to-end runtime scenarios on a scripted link
//!
//! Drives `DeviceRuntime::iterate` with an explicit clock so outages,
//! reconnects, and publish cadence can be asserted deterministically.

use std::time::{Duration, Instant};
use telemetryd::error::{BrokerCode, TelemetryError};
use telemetryd::link::Inbound;
use telemetryd::runtime::{DeviceRuntime, RuntimeSettings};
use telemetryd::supervisor::{CompositeState, RetryPolicy};
use telemetryd::telemetry::SimulatedSensor;
use telemetryd::testing::{
    credentials_profile, tls_profile, RecordingReporter, ScriptedLink, StaticPayload,
};

fn settings(retry: RetryPolicy) -> RuntimeSettings {
    RuntimeSettings {
        poll_interval: Duration::from_millis(5_000),
        connect_timeout: Duration::from_millis(5_000),
        retry,
        publish_interval: Duration::from_millis(5_000),
        topic: "telemetry/data".to_string(),
        max_payload_bytes: 256,
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[tokio::test]
async fn test_recovers_after_repeated_broker_rejections() {
    // Broker rejects three times with "not authorized", then accepts.
    let link = ScriptedLink::new().link_up().with_connect_results([
        Err(BrokerCode::NotAuthorized),
        Err(BrokerCode::NotAuthorized),
        Err(BrokerCode::NotAuthorized),
        Ok(()),
    ]);
    let published = link.published_log();
    let reporter = RecordingReporter::new();

    let mut runtime = DeviceRuntime::new(
        link,
        tls_profile("devkit-01"),
        settings(RetryPolicy::Continuous),
        Box::new(StaticPayload(b"{}".to_vec())),
        Box::new(reporter.clone()),
    );

    let base = Instant::now();
    for i in 0..4u64 {
        runtime.iterate(base + ms(100 * i)).await.unwrap();
    }

    let trace: Vec<(CompositeState, CompositeState)> = reporter
        .log()
        .iter()
        .map(|(from, to, _)| (*from, *to))
        .collect();
    let mut expected = vec![(CompositeState::Disconnected, CompositeState::LinkOnly)];
    for _ in 0..3 {
        expected.push((CompositeState::LinkOnly, CompositeState::Connecting));
        expected.push((CompositeState::Connecting, CompositeState::LinkOnly));
    }
    expected.push((CompositeState::LinkOnly, CompositeState::Connecting));
    expected.push((CompositeState::Connecting, CompositeState::Connected));
    assert_eq!(trace, expected);

    // First telemetry cycle goes out in the same iteration that
    // established the session.
    let published = published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "telemetry/data");
    assert_eq!(runtime.stats().published, 1);
}

#[tokio::test]
async fn test_sequence_numbers_survive_session_loss() {
    let link = ScriptedLink::new()
        .link_up()
        .with_connect_results([Ok(()), Ok(())])
        .with_service_results([
            Ok(vec![Inbound {
                topic: "telemetry/commands".to_string(),
                payload: b"ping".to_vec(),
            }]),
            Err(BrokerCode::ConnectionLost),
        ]);
    let published = link.published_log();

    let mut runtime = DeviceRuntime::new(
        link,
        credentials_profile("devkit-01"),
        settings(RetryPolicy::Continuous),
        Box::new(SimulatedSensor::new(Some("devkit-01".to_string()))),
        Box::new(RecordingReporter::new()),
    );

    let base = Instant::now();
    // Connect and publish, then one quiet serviced interval, then the
    // session dies mid-flight and the loop reconnects.
    runtime.iterate(base).await.unwrap();
    runtime.iterate(base + ms(5_000)).await.unwrap();
    runtime.iterate(base + ms(10_000)).await.unwrap();
    runtime.iterate(base + ms(10_100)).await.unwrap();

    let message_ids: Vec<u64> = published
        .lock()
        .unwrap()
        .iter()
        .map(|(_, payload)| {
            let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
            value["messageId"].as_u64().unwrap()
        })
        .collect();
    // No reset across the outage
    assert_eq!(message_ids, vec![0, 1, 2]);
    assert_eq!(runtime.stats().received, 1);
}

#[tokio::test]
async fn test_bounded_retry_exhaustion_is_permanent_failure() {
    let link = ScriptedLink::new().link_up().with_connect_results([
        Err(BrokerCode::ServerUnavailable),
        Err(BrokerCode::ServerUnavailable),
    ]);

    let mut runtime = DeviceRuntime::new(
        link,
        credentials_profile("devkit-01"),
        settings(RetryPolicy::Bounded {
            max_attempts: 2,
            delay_ms: 0,
        }),
        Box::new(StaticPayload(b"{}".to_vec())),
        Box::new(RecordingReporter::new()),
    );

    let base = Instant::now();
    runtime.iterate(base).await.unwrap();
    runtime.iterate(base + ms(100)).await.unwrap();
    let err = runtime.iterate(base + ms(200)).await.unwrap_err();

    assert!(matches!(
        err,
        TelemetryError::RetriesExhausted { attempts: 2 }
    ));
}

#[tokio::test]
async fn test_oversized_payload_is_skipped_not_published() {
    let link = ScriptedLink::new().link_up().with_connect_results([Ok(())]);
    let published = link.published_log();

    let mut runtime = DeviceRuntime::new(
        link,
        credentials_profile("devkit-01"),
        settings(RetryPolicy::Continuous),
        Box::new(StaticPayload(vec![b'x'; 300])),
        Box::new(RecordingReporter::new()),
    );

    runtime.iterate(Instant::now()).await.unwrap();

    assert!(published.lock().unwrap().is_empty());
    assert_eq!(runtime.stats().published, 0);
    assert_eq!(runtime.stats().publish_failures, 1);
}

#[tokio::test]
async fn test_no_publish_while_link_is_down() {
    let link = ScriptedLink::new();
    let published = link.published_log();

    let mut runtime = DeviceRuntime::new(
        link,
        credentials_profile("devkit-01"),
        settings(RetryPolicy::Continuous),
        Box::new(StaticPayload(b"{}".to_vec())),
        Box::new(RecordingReporter::new()),
    );

    let base = Instant::now();
    for i in 0..5u64 {
        runtime.iterate(base + ms(5_000 * i)).await.unwrap();
    }

    assert!(published.lock().unwrap().is_empty());
    assert_eq!(
        runtime.state().composite(),
        CompositeState::Disconnected
    );
}
