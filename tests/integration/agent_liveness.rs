//! Agent liveness: synthetic offline records, transitions, and ingestion

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dideban::probes::ProbeDispatcher;
use dideban::scheduler::SchedulerConfig;
use dideban::storage::schema::{AgentStatus, AlertCondition, AlertDeliveryStatus};
use dideban::storage::validators::ProbeDefaults;
use dideban::storage::MemoryBackend;
use dideban::Engine;

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
async fn stale_agent_goes_offline_with_synthetic_record_and_alert() {
    let storage = Arc::new(MemoryBackend::new());
    // interval 60 s, last seen 200 s ago: well past interval + grace
    let stale = storage.seed_agent(agent(
        "web-1",
        60,
        Some(Utc::now() - chrono::Duration::seconds(200)),
    ));
    storage.seed_alert(agent_alert(stale.id, AlertCondition::AgentOffline, None));

    let alerter = RecordingSender::new();
    let engine = engine_with(Arc::clone(&storage), Arc::clone(&alerter));

    engine.evaluate_agent_liveness().await;

    // One synthetic row, all metrics zero
    let history = storage.agent_history();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_offline);
    assert_eq!(history[0].cpu_usage_percent, 0.0);
    assert_eq!(history[0].memory_total_mb, 0);
    assert_eq!(history[0].collect_duration_ms, 0);

    // Status transitioned
    assert_eq!(storage.agent(stale.id).unwrap().status, AgentStatus::Offline);

    // Offline alert fired and was recorded
    let sent = alerter.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].status, "down");
    assert_eq!(sent[0].monitor_name, "web-1");

    let dispatches = storage.alert_history();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].status, AlertDeliveryStatus::Sent);
    assert_eq!(dispatches[0].agent_metric_id, Some(history[0].id));
}

#[tokio::test]
async fn fresh_agent_is_left_alone() {
    let storage = Arc::new(MemoryBackend::new());
    // Last seen 10 s ago with a 60 s interval: comfortably alive
    storage.seed_agent(agent(
        "web-2",
        60,
        Some(Utc::now() - chrono::Duration::seconds(10)),
    ));

    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    engine.evaluate_agent_liveness().await;

    assert!(storage.agent_history().is_empty());
}

#[tokio::test]
async fn repeated_passes_append_repeated_offline_records() {
    let storage = Arc::new(MemoryBackend::new());
    let silent = storage.seed_agent(agent("silent", 60, None));

    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    for _ in 0..3 {
        engine.evaluate_agent_liveness().await;
    }

    // Every pass records a fresh synthetic row; the timeline is continuous
    let history = storage.agent_history();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|row| row.is_offline));
    assert!(history.iter().all(|row| row.agent_id == silent.id));
}

#[tokio::test(start_paused = true)]
async fn liveness_loop_emits_one_record_per_30s_period() {
    let storage = Arc::new(MemoryBackend::new());
    storage.seed_agent(agent("never-reports", 60, None));

    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());
    engine.start().await.unwrap();

    // 95 simulated seconds cover the ticks at t=30, 60, and 90
    tokio::time::sleep(Duration::from_secs(95)).await;
    engine.stop().await;

    assert_eq!(storage.agent_history().len(), 3);
}

#[tokio::test]
async fn ingestion_updates_liveness_and_fires_threshold_alerts() {
    let storage = Arc::new(MemoryBackend::new());
    let mut seeded = agent("web-3", 60, None);
    seeded.status = AgentStatus::Offline;
    let seeded = storage.seed_agent(seeded);

    storage.seed_alert(agent_alert(
        seeded.id,
        AlertCondition::CpuUsageHigh,
        Some(90.0),
    ));
    storage.seed_alert(agent_alert(
        seeded.id,
        AlertCondition::MemoryUsageHigh,
        Some(80.0),
    ));

    let alerter = RecordingSender::new();
    let engine = engine_with(Arc::clone(&storage), Arc::clone(&alerter));

    // CPU at the threshold (>= fires), memory below it
    let stored = engine
        .ingest_agent_metrics(&seeded, snapshot(seeded.id, 90.0, 50.0, 30.0))
        .await
        .unwrap();
    assert!(stored.id > 0);

    let updated = storage.agent(seeded.id).unwrap();
    assert_eq!(updated.status, AgentStatus::Online);
    assert_eq!(updated.last_seen_at, Some(stored.collected_at));

    let sent = alerter.sent();
    assert_eq!(sent.len(), 1, "only the CPU threshold is met");
    assert_eq!(sent[0].status, "cpu_usage_high");

    let dispatches = storage.alert_history();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].agent_metric_id, Some(stored.id));
}

#[tokio::test]
async fn ingestion_rejects_invalid_snapshots() {
    let storage = Arc::new(MemoryBackend::new());
    let seeded = storage.seed_agent(agent("web-4", 60, None));

    let engine = engine_with(Arc::clone(&storage), RecordingSender::new());

    let bad = snapshot(seeded.id, 120.0, 50.0, 30.0); // cpu > 100
    assert!(engine.ingest_agent_metrics(&seeded, bad).await.is_err());
    assert!(storage.agent_history().is_empty());
}
