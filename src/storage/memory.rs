//! In-memory storage backend (no persistence)
//!
//! Keeps every table as a `Vec` behind an `RwLock`. Useful for:
//! - Testing the engine without a database
//! - Running the binary before a durable backend is configured
//!
//! ## Limitations
//!
//! - **No persistence**: all data lost on restart
//! - **No indexes**: every list operation is a scan

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::schema::{
    Agent, AgentHistory, Alert, AlertCondition, AlertHistory, Check, CheckHistory,
};

#[derive(Debug, Default)]
struct Tables {
    checks: Vec<Check>,
    check_history: Vec<CheckHistory>,
    agents: Vec<Agent>,
    agent_history: Vec<AgentHistory>,
    alerts: Vec<Alert>,
    alert_history: Vec<AlertHistory>,
    next_id: i64,
}

impl Tables {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of the persistence port.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an agent directly, returning it with an assigned id.
    ///
    /// Agent registration is an API concern; tests and the binary use this
    /// to get agents into the store without one.
    pub fn seed_agent(&self, mut agent: Agent) -> Agent {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        agent.id = tables.assign_id();
        tables.agents.push(agent.clone());
        agent
    }

    /// Seed an alert rule directly, returning it with an assigned id.
    pub fn seed_alert(&self, mut alert: Alert) -> Alert {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        alert.id = tables.assign_id();
        tables.alerts.push(alert.clone());
        alert
    }

    /// Snapshot of all persisted check observations.
    pub fn check_history(&self) -> Vec<CheckHistory> {
        self.tables
            .read()
            .expect("storage lock poisoned")
            .check_history
            .clone()
    }

    /// Snapshot of all persisted agent snapshots.
    pub fn agent_history(&self) -> Vec<AgentHistory> {
        self.tables
            .read()
            .expect("storage lock poisoned")
            .agent_history
            .clone()
    }

    /// Snapshot of all alert dispatch records.
    pub fn alert_history(&self) -> Vec<AlertHistory> {
        self.tables
            .read()
            .expect("storage lock poisoned")
            .alert_history
            .clone()
    }

    /// Current state of an agent, if present.
    pub fn agent(&self, id: i64) -> Option<Agent> {
        self.tables
            .read()
            .expect("storage lock poisoned")
            .agents
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn create_check(&self, mut check: Check) -> StorageResult<Check> {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        if tables.checks.iter().any(|c| c.name == check.name) {
            return Err(StorageError::Conflict(format!(
                "check name already exists: {}",
                check.name
            )));
        }
        check.id = tables.assign_id();
        tables.checks.push(check.clone());
        debug!(check_id = check.id, name = %check.name, "check created");
        Ok(check)
    }

    async fn update_check(&self, check: Check) -> StorageResult<()> {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        match tables.checks.iter_mut().find(|c| c.id == check.id) {
            Some(slot) => {
                *slot = check;
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("check {}", check.id))),
        }
    }

    async fn delete_check(&self, id: i64) -> StorageResult<()> {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        let before = tables.checks.len();
        tables.checks.retain(|c| c.id != id);
        if tables.checks.len() == before {
            return Err(StorageError::NotFound(format!("check {id}")));
        }
        Ok(())
    }

    async fn get_check(&self, id: i64) -> StorageResult<Check> {
        self.tables
            .read()
            .expect("storage lock poisoned")
            .checks
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("check {id}")))
    }

    async fn list_enabled_checks(&self) -> StorageResult<Vec<Check>> {
        Ok(self
            .tables
            .read()
            .expect("storage lock poisoned")
            .checks
            .iter()
            .filter(|c| c.enabled)
            .cloned()
            .collect())
    }

    async fn create_check_history(&self, mut observation: CheckHistory) -> StorageResult<CheckHistory> {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        observation.id = tables.assign_id();
        tables.check_history.push(observation.clone());
        Ok(observation)
    }

    async fn list_enabled_agents(&self) -> StorageResult<Vec<Agent>> {
        Ok(self
            .tables
            .read()
            .expect("storage lock poisoned")
            .agents
            .iter()
            .filter(|a| a.enabled)
            .cloned()
            .collect())
    }

    async fn update_agent(&self, agent: Agent) -> StorageResult<()> {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        match tables.agents.iter_mut().find(|a| a.id == agent.id) {
            Some(slot) => {
                *slot = agent;
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("agent {}", agent.id))),
        }
    }

    async fn update_agent_last_seen_at(&self, id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        match tables.agents.iter_mut().find(|a| a.id == id) {
            Some(agent) => {
                agent.last_seen_at = Some(at);
                agent.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StorageError::NotFound(format!("agent {id}"))),
        }
    }

    async fn create_agent_history(&self, mut snapshot: AgentHistory) -> StorageResult<AgentHistory> {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        snapshot.id = tables.assign_id();
        tables.agent_history.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list_enabled_alerts_by_check(&self, check_id: i64) -> StorageResult<Vec<Alert>> {
        Ok(self
            .tables
            .read()
            .expect("storage lock poisoned")
            .alerts
            .iter()
            .filter(|a| a.enabled && a.check_id == Some(check_id))
            .cloned()
            .collect())
    }

    async fn list_enabled_alerts_by_agent(&self, agent_id: i64) -> StorageResult<Vec<Alert>> {
        Ok(self
            .tables
            .read()
            .expect("storage lock poisoned")
            .alerts
            .iter()
            .filter(|a| a.enabled && a.agent_id == Some(agent_id))
            .cloned()
            .collect())
    }

    async fn list_enabled_alerts_by_agent_and_condition(
        &self,
        agent_id: i64,
        condition: AlertCondition,
    ) -> StorageResult<Vec<Alert>> {
        Ok(self
            .tables
            .read()
            .expect("storage lock poisoned")
            .alerts
            .iter()
            .filter(|a| a.enabled && a.agent_id == Some(agent_id) && a.condition == condition)
            .cloned()
            .collect())
    }

    async fn create_alert_history(&self, mut record: AlertHistory) -> StorageResult<AlertHistory> {
        let mut tables = self.tables.write().expect("storage lock poisoned");
        record.id = tables.assign_id();
        tables.alert_history.push(record.clone());
        Ok(record)
    }
}
