//! Storage backend trait definition
//!
//! This module defines the narrow persistence port the engine consumes.
//! Any backend satisfying this contract is acceptable - the engine never
//! sees SQL, files, or connection pools.
//!
//! ## Thread Safety
//!
//! Implementations must be `Send + Sync` as they are shared across async
//! tasks. Connection pooling and locking are the backend's problem; the
//! engine never holds a lock of its own while calling into storage.
//!
//! ## Error Handling
//!
//! Methods return `StorageResult<T>`. The engine treats persistence errors
//! as non-fatal at runtime: the failing tick is logged and abandoned, with
//! no retry and no backfill.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{
    Agent, AgentHistory, Alert, AlertCondition, AlertHistory, Check, CheckHistory,
};

/// The persistence operations the monitoring engine requires.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Persist a new check and return it with its assigned id.
    async fn create_check(&self, check: Check) -> StorageResult<Check>;

    /// Replace an existing check record.
    async fn update_check(&self, check: Check) -> StorageResult<()>;

    /// Delete a check by id.
    ///
    /// The engine stops the corresponding scheduled job before calling this.
    async fn delete_check(&self, id: i64) -> StorageResult<()>;

    /// Fetch a single check by id.
    async fn get_check(&self, id: i64) -> StorageResult<Check>;

    /// All checks with `enabled = true`, the set the engine schedules.
    async fn list_enabled_checks(&self) -> StorageResult<Vec<Check>>;

    /// Append one probe observation.
    async fn create_check_history(&self, observation: CheckHistory) -> StorageResult<CheckHistory>;

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// All agents with `enabled = true`, the set the liveness loop scans.
    async fn list_enabled_agents(&self) -> StorageResult<Vec<Agent>>;

    /// Replace an existing agent record (status transitions land here).
    async fn update_agent(&self, agent: Agent) -> StorageResult<()>;

    /// Touch the liveness timestamp without rewriting the whole record.
    async fn update_agent_last_seen_at(&self, id: i64, at: DateTime<Utc>) -> StorageResult<()>;

    /// Append one metric snapshot (real or synthetic offline).
    async fn create_agent_history(&self, snapshot: AgentHistory) -> StorageResult<AgentHistory>;

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    /// Enabled alert rules owned by the given check.
    async fn list_enabled_alerts_by_check(&self, check_id: i64) -> StorageResult<Vec<Alert>>;

    /// Enabled alert rules owned by the given agent.
    async fn list_enabled_alerts_by_agent(&self, agent_id: i64) -> StorageResult<Vec<Alert>>;

    /// Enabled alert rules owned by the given agent with a specific condition.
    async fn list_enabled_alerts_by_agent_and_condition(
        &self,
        agent_id: i64,
        condition: AlertCondition,
    ) -> StorageResult<Vec<Alert>>;

    /// Append one alert dispatch attempt.
    async fn create_alert_history(&self, record: AlertHistory) -> StorageResult<AlertHistory>;
}
