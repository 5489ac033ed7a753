//! Helper functions and fakes for integration tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dideban::alerts::{AlertData, AlertSender};
use dideban::storage::schema::{
    Agent, AgentHistory, AgentStatus, Alert, AlertCondition, AlertKind, Check, CheckKind,
};

/// An HTTP check pointing at the given target.
pub fn http_check(name: &str, target: &str) -> Check {
    Check {
        id: 0,
        enabled: true,
        name: name.to_string(),
        kind: CheckKind::Http,
        target: target.to_string(),
        config: "{}".to_string(),
        interval_seconds: 30,
        timeout_seconds: 5,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// An agent with the given reporting interval and last-seen timestamp.
pub fn agent(name: &str, interval_seconds: u32, last_seen_at: Option<DateTime<Utc>>) -> Agent {
    Agent {
        id: 0,
        name: name.to_string(),
        enabled: true,
        interval_seconds,
        auth_token: "a".repeat(64),
        status: AgentStatus::Online,
        last_seen_at,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// An alert rule owned by a check.
pub fn check_alert(check_id: i64, condition: AlertCondition) -> Alert {
    Alert {
        id: 0,
        check_id: Some(check_id),
        agent_id: None,
        kind: AlertKind::Webhook,
        config: "{}".to_string(),
        condition,
        condition_value: None,
        enabled: true,
        created_at: Utc::now(),
    }
}

/// An alert rule owned by an agent.
pub fn agent_alert(agent_id: i64, condition: AlertCondition, value: Option<f64>) -> Alert {
    Alert {
        id: 0,
        check_id: None,
        agent_id: Some(agent_id),
        kind: AlertKind::Webhook,
        config: "{}".to_string(),
        condition,
        condition_value: value,
        enabled: true,
        created_at: Utc::now(),
    }
}

/// A normal (online) agent metrics snapshot.
pub fn snapshot(agent_id: i64, cpu: f64, memory: f64, disk: f64) -> AgentHistory {
    AgentHistory {
        id: 0,
        agent_id,
        is_offline: false,
        collect_duration_ms: 12,
        cpu_load_1: 0.4,
        cpu_load_5: 0.3,
        cpu_load_15: 0.2,
        cpu_usage_percent: cpu,
        memory_total_mb: 4096,
        memory_used_mb: 2048,
        memory_available_mb: 2048,
        memory_usage_percent: memory,
        disk_total_gb: 100,
        disk_used_gb: 40,
        disk_usage_percent: disk,
        collected_at: Utc::now(),
    }
}

/// Transport fake that records every payload and can be told to fail.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<AlertData>>,
    fail: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let sender = Self::default();
        sender.fail.store(true, Ordering::SeqCst);
        Arc::new(sender)
    }

    pub fn sent(&self) -> Vec<AlertData> {
        self.sent.lock().expect("sender lock poisoned").clone()
    }
}

#[async_trait]
impl AlertSender for RecordingSender {
    async fn send_alert(&self, data: &AlertData) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("transport unavailable");
        }
        self.sent
            .lock()
            .expect("sender lock poisoned")
            .push(data.clone());
        Ok(())
    }
}
