//! Engine lifecycle: start/stop semantics and cancellation

use std::sync::Arc;
use std::time::Duration;

use dideban::probes::ProbeDispatcher;
use dideban::scheduler::SchedulerConfig;
use dideban::storage::validators::ProbeDefaults;
use dideban::storage::MemoryBackend;
use dideban::{Engine, StorageBackend};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::*;

fn engine_with(storage: Arc<MemoryBackend>, alerter: Arc<RecordingSender>) -> Engine {
    Engine::new(
        SchedulerConfig::default(),
        storage,
        Arc::new(ProbeDispatcher::with_standard_probes(&ProbeDefaults::default())),
        alerter,
    )
}

#[tokio::test]
async fn double_start_fails_and_stop_is_idempotent() {
    let storage = Arc::new(MemoryBackend::new());
    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());

    engine.start().await.unwrap();
    assert!(engine.is_running().await);
    assert!(engine.start().await.is_err());

    engine.stop().await;
    assert!(!engine.is_running().await);

    // Stopping again is a no-op
    engine.stop().await;

    // A stopped engine can be started again
    engine.start().await.unwrap();
    engine.stop().await;
}

#[tokio::test]
async fn add_check_requires_running_engine() {
    let storage = Arc::new(MemoryBackend::new());
    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());

    let check = http_check("api", "https://example.com/health");
    assert!(engine.add_check(check).await.is_err());
}

#[tokio::test]
async fn add_check_validates_and_canonicalizes() {
    let storage = Arc::new(MemoryBackend::new());
    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    engine.start().await.unwrap();

    // Invalid: timeout not below interval
    let mut check = http_check("bad", "https://example.com");
    check.interval_seconds = 30;
    check.timeout_seconds = 30;
    assert!(engine.add_check(check).await.is_err());

    // Valid: stored with canonical config and scheduled
    let created = engine
        .add_check(http_check("api", "https://example.com/health"))
        .await
        .unwrap();
    assert!(created.id > 0);
    assert!(created.config.contains("\"method\":\"GET\""));
    assert!(created.config.contains("\"expected_status\":200"));
    assert_eq!(engine.scheduler().job_count(), 1);

    engine.stop().await;
}

#[tokio::test]
async fn remove_check_stops_job_before_deleting_record() {
    let storage = Arc::new(MemoryBackend::new());
    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    engine.start().await.unwrap();

    let created = engine
        .add_check(http_check("api", "https://example.com/health"))
        .await
        .unwrap();
    assert_eq!(engine.scheduler().job_count(), 1);

    engine.remove_check(created.id).await.unwrap();
    assert_eq!(engine.scheduler().job_count(), 0);
    assert!(storage.list_enabled_checks().await.unwrap().is_empty());

    engine.stop().await;
}

#[tokio::test]
async fn stop_cancels_inflight_probe_tasks() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryBackend::new());
    let mut check = http_check("slow", &mock_server.uri());
    check.interval_seconds = 600;
    check.timeout_seconds = 300;
    storage.create_check(check).await.unwrap();

    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    engine.start().await.unwrap();

    // Let the immediate firing get in flight against the slow endpoint
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Stop must not wait out the 30 s response: the probe future is
    // dropped at its await point
    tokio::time::timeout(Duration::from_secs(5), engine.stop())
        .await
        .expect("stop must cancel in-flight probes promptly");
}
