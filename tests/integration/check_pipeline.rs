//! Check execution pipeline: probe -> observation -> alert evaluation

use std::sync::Arc;
use std::time::Duration;

use dideban::probes::ProbeDispatcher;
use dideban::scheduler::SchedulerConfig;
use dideban::storage::schema::{AlertCondition, AlertDeliveryStatus, CheckStatus};
use dideban::storage::validators::ProbeDefaults;
use dideban::storage::MemoryBackend;
use dideban::{Engine, StorageBackend};
use wiremock::matchers::{method, path};
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

/// Wait until the storage holds at least `count` observations.
async fn wait_for_observations(storage: &MemoryBackend, count: usize) {
    for _ in 0..100 {
        if storage.check_history().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected at least {count} observations, got {}",
        storage.check_history().len()
    );
}

#[tokio::test]
async fn healthy_endpoint_persists_up_observation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryBackend::new());
    let check = storage
        .create_check(http_check("api", &format!("{}/health", mock_server.uri())))
        .await
        .unwrap();

    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    engine.start().await.unwrap();
    wait_for_observations(&storage, 1).await;
    engine.stop().await;

    let history = storage.check_history();
    let observation = &history[0];
    assert_eq!(observation.check_id, check.id);
    assert_eq!(observation.status, CheckStatus::Up);
    assert_eq!(observation.status_code, Some(200));
    assert!(observation.response_time_ms.is_some());
}

#[tokio::test]
async fn matching_alert_fires_and_is_recorded_as_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryBackend::new());
    let check = storage
        .create_check(http_check("api", &mock_server.uri()))
        .await
        .unwrap();
    // status_down matches the 500 observation; status_timeout must not fire
    let down_alert = storage.seed_alert(check_alert(check.id, AlertCondition::StatusDown));
    storage.seed_alert(check_alert(check.id, AlertCondition::StatusTimeout));

    let alerter = RecordingSender::new();
    let engine = engine_with(Arc::clone(&storage), Arc::clone(&alerter));
    engine.start().await.unwrap();
    wait_for_observations(&storage, 1).await;
    engine.stop().await;

    let observation = &storage.check_history()[0];
    assert_eq!(observation.status, CheckStatus::Down);
    assert_eq!(observation.status_code, Some(500));

    let sent = alerter.sent();
    assert_eq!(sent.len(), 1, "only the matching condition fires");
    assert_eq!(sent[0].status, "down");
    assert_eq!(sent[0].monitor_name, "api");

    let dispatches = storage.alert_history();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].alert_id, down_alert.id);
    assert_eq!(dispatches[0].status, AlertDeliveryStatus::Sent);
    assert_eq!(dispatches[0].check_result_id, Some(observation.id));
    assert!(dispatches[0].title.contains("api is down"));
}

#[tokio::test]
async fn failed_transport_is_recorded_as_failed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryBackend::new());
    let check = storage
        .create_check(http_check("api", &mock_server.uri()))
        .await
        .unwrap();
    storage.seed_alert(check_alert(check.id, AlertCondition::StatusDown));

    let engine = engine_with(Arc::clone(&storage), RecordingSender::failing());
    engine.start().await.unwrap();
    wait_for_observations(&storage, 1).await;
    engine.stop().await;

    let dispatches = storage.alert_history();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].status, AlertDeliveryStatus::Failed);
    assert!(dispatches[0].message.contains("transport unavailable"));
}

#[tokio::test]
async fn unresolvable_target_persists_error_observation() {
    let storage = Arc::new(MemoryBackend::new());
    // .invalid is reserved and never resolves
    storage
        .create_check(http_check("ghost", "https://no-such-host.invalid/"))
        .await
        .unwrap();

    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    engine.start().await.unwrap();
    wait_for_observations(&storage, 1).await;
    engine.stop().await;

    let observation = &storage.check_history()[0];
    assert_eq!(observation.status, CheckStatus::Error);
    assert!(observation.error_message.is_some());
}

#[tokio::test]
async fn slow_endpoint_persists_timeout_observation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryBackend::new());
    let mut check = http_check("slow", &mock_server.uri());
    check.timeout_seconds = 1;
    // The probe honors the configured request timeout
    check.config = r#"{"timeout_seconds": 1}"#.to_string();
    storage.create_check(check).await.unwrap();

    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    engine.start().await.unwrap();
    wait_for_observations(&storage, 1).await;
    engine.stop().await;

    let observation = &storage.check_history()[0];
    assert_eq!(observation.status, CheckStatus::Timeout);
}
