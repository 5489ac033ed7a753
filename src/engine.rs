//! The monitoring engine
//!
//! Owns the scheduler, the probe dispatcher, the alert transport, and a
//! handle to persistence. Starting the engine loads every enabled check,
//! schedules one job per check, and spawns the agent-liveness supervisor.
//!
//! ## Pipeline
//!
//! ```text
//! timer tick -> dispatcher.execute(check) -> persist observation
//!            -> evaluate matching alerts -> send -> record AlertHistory
//! ```
//!
//! A separate 30-second loop evaluates agent liveness and appends
//! synthetic offline snapshots for silent agents.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::alerts::{format_alert_message, AlertData, AlertSender};
use crate::probes::ProbeDispatcher;
use crate::scheduler::{ScheduledJob, Scheduler, SchedulerConfig};
use crate::storage::schema::{
    Agent, AgentHistory, AgentStatus, Alert, AlertCondition, AlertDeliveryStatus, AlertHistory,
    Check, CheckHistory, CheckStatus,
};
use crate::storage::{validators, StorageBackend};

/// Cadence of the agent-liveness loop.
const LIVENESS_TICK: Duration = Duration::from_secs(30);

/// Slack added on top of an agent's reporting interval before it counts
/// as offline.
const LIVENESS_GRACE_SECONDS: i64 = 30;

#[derive(Default)]
struct EngineState {
    running: bool,
    shutdown: Option<watch::Sender<bool>>,
    supervisor: Option<JoinHandle<()>>,
}

/// The core monitoring engine.
pub struct Engine {
    storage: Arc<dyn StorageBackend>,
    dispatcher: Arc<ProbeDispatcher>,
    alerter: Arc<dyn AlertSender>,
    scheduler: Scheduler,
    state: Mutex<EngineState>,
}

impl Engine {
    pub fn new(
        config: SchedulerConfig,
        storage: Arc<dyn StorageBackend>,
        dispatcher: Arc<ProbeDispatcher>,
        alerter: Arc<dyn AlertSender>,
    ) -> Self {
        Self {
            storage,
            dispatcher,
            alerter,
            scheduler: Scheduler::new(config),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Start the engine: load enabled checks and agents, start the
    /// scheduler, schedule every check, and spawn the liveness supervisor.
    ///
    /// Failing to load entities or start the scheduler is fatal and
    /// propagates; a single check failing to schedule is logged and
    /// skipped.
    pub async fn start(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if state.running {
            anyhow::bail!("engine is already running");
        }

        info!("starting monitoring engine");

        let checks = self
            .storage
            .list_enabled_checks()
            .await
            .map_err(|err| anyhow::anyhow!("failed to load checks: {err}"))?;
        info!(count = checks.len(), "loaded checks");

        let agents = self
            .storage
            .list_enabled_agents()
            .await
            .map_err(|err| anyhow::anyhow!("failed to load agents: {err}"))?;
        info!(count = agents.len(), "loaded agents");

        self.scheduler.start()?;

        for check in checks {
            let check_id = check.id;
            let name = check.name.clone();
            if let Err(err) = self.schedule_check(check) {
                error!(check_id, name, error = %err, "failed to schedule check");
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let storage = Arc::clone(&self.storage);
        let alerter = Arc::clone(&self.alerter);
        let supervisor = tokio::spawn(liveness_loop(storage, alerter, shutdown_rx));

        state.shutdown = Some(shutdown_tx);
        state.supervisor = Some(supervisor);
        state.running = true;

        info!("monitoring engine started");
        Ok(())
    }

    /// Whether the engine is currently running.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// The scheduler owned by this engine.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Stop the engine: cancel the supervisor, quiesce the scheduler, and
    /// wait for in-flight work. No-op when not running.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if !state.running {
            return;
        }

        info!("stopping monitoring engine");

        if let Some(shutdown) = state.shutdown.take() {
            let _ = shutdown.send(true);
        }
        self.scheduler.stop().await;
        if let Some(supervisor) = state.supervisor.take() {
            let _ = supervisor.await;
        }

        state.running = false;
        info!("monitoring engine stopped");
    }

    /// Validate, persist, and schedule a new check.
    pub async fn add_check(&self, mut check: Check) -> anyhow::Result<Check> {
        if !self.is_running().await {
            anyhow::bail!("engine is not running");
        }

        validators::validate_check(&mut check)?;
        let check = self
            .storage
            .create_check(check)
            .await
            .map_err(|err| anyhow::anyhow!("failed to save check: {err}"))?;

        if check.enabled {
            self.schedule_check(check.clone())?;
        }

        info!(check_id = check.id, name = %check.name, "check added");
        Ok(check)
    }

    /// Stop a check's job, then delete its record.
    pub async fn remove_check(&self, id: i64) -> anyhow::Result<()> {
        // The job is stopped before the record goes away; a disabled check
        // has no job, which is fine.
        let _ = self.scheduler.remove_job(&job_id(id)).await;

        self.storage
            .delete_check(id)
            .await
            .map_err(|err| anyhow::anyhow!("failed to delete check: {err}"))?;

        info!(check_id = id, "check removed");
        Ok(())
    }

    /// Persist a pushed agent snapshot and evaluate threshold alerts.
    ///
    /// This is the ingestion path: the snapshot is validated, stored, the
    /// agent's `last_seen_at` is touched and its status flipped online,
    /// and every `*_usage_high` alert owned by the agent is compared
    /// against the corresponding percentage with `>=`.
    pub async fn ingest_agent_metrics(
        &self,
        agent: &Agent,
        mut snapshot: AgentHistory,
    ) -> anyhow::Result<AgentHistory> {
        snapshot.agent_id = agent.id;
        validators::validate_agent_history(&mut snapshot)?;

        let snapshot = self
            .storage
            .create_agent_history(snapshot)
            .await
            .map_err(|err| anyhow::anyhow!("failed to persist agent metrics: {err}"))?;

        if let Err(err) = self
            .storage
            .update_agent_last_seen_at(agent.id, snapshot.collected_at)
            .await
        {
            error!(agent_id = agent.id, error = %err, "failed to update agent last seen");
        }

        if agent.status != AgentStatus::Online {
            let mut updated = agent.clone();
            updated.status = AgentStatus::Online;
            updated.last_seen_at = Some(snapshot.collected_at);
            updated.updated_at = Utc::now();
            if let Err(err) = self.storage.update_agent(updated).await {
                error!(agent_id = agent.id, error = %err, "failed to update agent status to online");
            }
        }

        self.evaluate_threshold_alerts(agent, &snapshot).await;
        Ok(snapshot)
    }

    /// Run one liveness pass immediately, outside the 30-second cadence.
    pub async fn evaluate_agent_liveness(&self) {
        check_offline_agents(self.storage.as_ref(), self.alerter.as_ref()).await;
    }

    fn schedule_check(&self, check: Check) -> anyhow::Result<()> {
        let interval = check.interval();
        let id = job_id(check.id);
        let storage = Arc::clone(&self.storage);
        let dispatcher = Arc::clone(&self.dispatcher);
        let alerter = Arc::clone(&self.alerter);
        let check = Arc::new(check);

        let job = ScheduledJob::new(id, interval, move || {
            execute_check(
                Arc::clone(&storage),
                Arc::clone(&dispatcher),
                Arc::clone(&alerter),
                Arc::clone(&check),
            )
        });
        self.scheduler.add_job(job)
    }

    /// Compare a snapshot against the agent's threshold alert rules.
    async fn evaluate_threshold_alerts(&self, agent: &Agent, snapshot: &AgentHistory) {
        let alerts = match self.storage.list_enabled_alerts_by_agent(agent.id).await {
            Ok(alerts) => alerts,
            Err(err) => {
                error!(agent_id = agent.id, error = %err, "failed to load alerts for agent");
                return;
            }
        };

        for alert in alerts {
            let observed = match alert.condition {
                AlertCondition::CpuUsageHigh => snapshot.cpu_usage_percent,
                AlertCondition::MemoryUsageHigh => snapshot.memory_usage_percent,
                AlertCondition::DiskUsageHigh => snapshot.disk_usage_percent,
                _ => continue,
            };
            let Some(threshold) = alert.condition_value else {
                continue;
            };
            if observed < threshold {
                continue;
            }

            let mut metadata = serde_json::Map::new();
            metadata.insert("value".to_string(), json!(observed));
            metadata.insert("threshold".to_string(), json!(threshold));

            let data = AlertData {
                monitor_id: agent.id,
                monitor_name: agent.name.clone(),
                status: alert.condition.to_string(),
                error: String::new(),
                response_time_ms: snapshot.collect_duration_ms,
                checked_at: snapshot.collected_at,
                target: format!("agent:{}", agent.name),
                metadata,
            };

            dispatch_alert(
                self.storage.as_ref(),
                self.alerter.as_ref(),
                &alert,
                &data,
                None,
                Some(snapshot.id),
                format!("Alert: {} {}", agent.name, alert.condition),
            )
            .await;
        }
    }
}

fn job_id(check_id: i64) -> String {
    format!("check_{check_id}")
}

/// One scheduled execution of a check: probe, persist, evaluate alerts.
async fn execute_check(
    storage: Arc<dyn StorageBackend>,
    dispatcher: Arc<ProbeDispatcher>,
    alerter: Arc<dyn AlertSender>,
    check: Arc<Check>,
) -> anyhow::Result<()> {
    debug!(check_id = check.id, name = %check.name, "executing check");

    let started = Instant::now();
    let outcome = tokio::time::timeout(check.timeout(), dispatcher.execute(&check)).await;
    let elapsed = started.elapsed().as_millis() as i64;

    let mut observation = match outcome {
        Ok(Ok(observation)) => observation,
        Ok(Err(err)) => {
            error!(check_id = check.id, name = %check.name, error = %err, "check execution failed");
            CheckHistory::new(check.id, err.status())
                .with_response_time(elapsed)
                .with_message(truncate_chars(&err.to_string(), 1000))
        }
        Err(_) => {
            warn!(check_id = check.id, name = %check.name, "check timed out");
            CheckHistory::new(check.id, CheckStatus::Timeout)
                .with_response_time(elapsed)
                .with_message(format!("probe timed out after {}s", check.timeout_seconds))
        }
    };
    observation.check_id = check.id;

    let observation = match storage.create_check_history(observation).await {
        Ok(row) => row,
        Err(err) => {
            // Abandon this tick: no retry, no backfill
            error!(check_id = check.id, error = %err, "failed to persist check result");
            return Ok(());
        }
    };

    evaluate_check_alerts(storage.as_ref(), alerter.as_ref(), &check, &observation).await;
    Ok(())
}

/// Fire every enabled alert whose condition matches the observation.
async fn evaluate_check_alerts(
    storage: &dyn StorageBackend,
    alerter: &dyn AlertSender,
    check: &Check,
    observation: &CheckHistory,
) {
    let alerts = match storage.list_enabled_alerts_by_check(check.id).await {
        Ok(alerts) => alerts,
        Err(err) => {
            error!(check_id = check.id, name = %check.name, error = %err, "failed to load alerts for check");
            return;
        }
    };

    for alert in alerts {
        if alert.condition.matching_status() != Some(observation.status) {
            continue;
        }

        let data = AlertData {
            monitor_id: check.id,
            monitor_name: check.name.clone(),
            status: observation.status.to_string(),
            error: observation.error_message.clone().unwrap_or_default(),
            response_time_ms: observation.response_time_ms.unwrap_or(0),
            checked_at: observation.checked_at,
            target: check.target.clone(),
            metadata: serde_json::Map::new(),
        };

        dispatch_alert(
            storage,
            alerter,
            &alert,
            &data,
            Some(observation.id),
            None,
            format!("Alert: {} is {}", check.name, observation.status),
        )
        .await;
    }
}

/// Send one alert and record the attempt, sent or failed.
async fn dispatch_alert(
    storage: &dyn StorageBackend,
    alerter: &dyn AlertSender,
    alert: &Alert,
    data: &AlertData,
    check_result_id: Option<i64>,
    agent_metric_id: Option<i64>,
    title: String,
) {
    let (title, message, status) = match alerter.send_alert(data).await {
        Ok(()) => {
            info!(alert_id = alert.id, monitor = %data.monitor_name, "alert sent");
            (title, format_alert_message(data), AlertDeliveryStatus::Sent)
        }
        Err(err) => {
            error!(alert_id = alert.id, monitor = %data.monitor_name, error = %err, "failed to send alert");
            (
                format!("{title} (delivery failed)"),
                err.to_string(),
                AlertDeliveryStatus::Failed,
            )
        }
    };

    let now = Utc::now();
    let record = AlertHistory {
        id: 0,
        alert_id: alert.id,
        check_result_id,
        agent_metric_id,
        title: truncate_chars(&title, 200),
        message: truncate_chars(&message, 5000),
        status,
        sent_at: now,
        created_at: now,
    };

    if let Err(err) = storage.create_alert_history(record).await {
        error!(alert_id = alert.id, error = %err, "failed to record alert history");
    }
}

/// The agent-liveness supervisor: one pass every 30 seconds.
async fn liveness_loop(
    storage: Arc<dyn StorageBackend>,
    alerter: Arc<dyn AlertSender>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("agent liveness loop started");

    let mut ticker = tokio::time::interval(LIVENESS_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; consume it so the
    // first evaluation happens one full period after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                check_offline_agents(storage.as_ref(), alerter.as_ref()).await;
            }
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    debug!("agent liveness loop stopped");
                    return;
                }
            }
        }
    }
}

/// One liveness pass over every enabled agent.
///
/// An agent is offline iff it never reported, or its last report is older
/// than its interval plus the grace period. Every pass over an offline
/// agent appends a fresh synthetic history row - repetition is the point,
/// the rows form a continuous timeline of missed reports. The status
/// transition happens only once.
async fn check_offline_agents(storage: &dyn StorageBackend, alerter: &dyn AlertSender) {
    let agents = match storage.list_enabled_agents().await {
        Ok(agents) => agents,
        Err(err) => {
            error!(error = %err, "failed to load enabled agents for offline check");
            return;
        }
    };

    let now = Utc::now();
    let grace = chrono::Duration::seconds(LIVENESS_GRACE_SECONDS);

    for agent in agents {
        let max_delay = chrono::Duration::seconds(i64::from(agent.interval_seconds)) + grace;
        let offline = match agent.last_seen_at {
            None => true,
            Some(last_seen) => now - last_seen > max_delay,
        };
        if !offline {
            continue;
        }

        if agent.status != AgentStatus::Offline {
            let mut updated = agent.clone();
            updated.status = AgentStatus::Offline;
            updated.updated_at = now;
            if let Err(err) = storage.update_agent(updated).await {
                error!(agent_id = agent.id, error = %err, "failed to update agent status to offline");
            }
        }

        let history = match storage
            .create_agent_history(AgentHistory::offline(agent.id, now))
            .await
        {
            Ok(row) => row,
            Err(err) => {
                error!(agent_id = agent.id, error = %err, "failed to create offline agent history");
                continue;
            }
        };
        debug!(
            agent = %agent.name,
            history_id = history.id,
            "recorded offline agent history"
        );

        let alerts = match storage
            .list_enabled_alerts_by_agent_and_condition(agent.id, AlertCondition::AgentOffline)
            .await
        {
            Ok(alerts) => alerts,
            Err(err) => {
                error!(agent_id = agent.id, error = %err, "failed to load offline alerts for agent");
                continue;
            }
        };

        for alert in &alerts {
            let mut metadata = serde_json::Map::new();
            metadata.insert(
                "interval_seconds".to_string(),
                json!(i64::from(agent.interval_seconds) + LIVENESS_GRACE_SECONDS),
            );
            if let Some(last_seen) = agent.last_seen_at {
                metadata.insert("last_seen".to_string(), json!(last_seen.to_rfc3339()));
            }

            let data = AlertData {
                monitor_id: agent.id,
                monitor_name: agent.name.clone(),
                status: "down".to_string(),
                error: String::new(),
                response_time_ms: 0,
                checked_at: history.collected_at,
                target: format!("agent:{}", agent.name),
                metadata,
            };

            dispatch_alert(
                storage,
                alerter,
                alert,
                &data,
                None,
                Some(history.id),
                format!("Agent Offline: {}", agent.name),
            )
            .await;
        }
    }
}

/// Clamp a message to a persisted column limit, respecting char
/// boundaries.
fn truncate_chars(message: &str, max_bytes: usize) -> String {
    if message.len() <= max_bytes {
        return message.to_string();
    }
    let mut end = max_bytes;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
