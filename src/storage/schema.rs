//! Entity definitions for the monitoring engine
//!
//! Everything the engine touches is one of these value types. Records are
//! owned by storage and handed to the engine by value; the engine never
//! mutates a persisted row in place.
//!
//! Status and kind fields are real enums. Their serde renames keep the wire
//! strings stable (`http`, `up`, `status_down`, ...) so the JSON the
//! validator canonicalizes and the rows a future SQL backend maps stay
//! byte-compatible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled probe target.
///
/// This is the core entity - everything revolves around checks. Each check
/// defines what to monitor, how often, and what counts as success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    /// Monotonically assigned identifier
    pub id: i64,

    /// Whether the check is actively scheduled
    pub enabled: bool,

    /// Human-readable identifier, unique across all checks
    pub name: String,

    /// Probe kind routing this check to an implementation
    pub kind: CheckKind,

    /// Monitoring target (URL for http, host/IP for ping)
    pub target: String,

    /// Probe configuration as canonical JSON (schema depends on `kind`)
    pub config: String,

    /// How often the check runs, in seconds
    pub interval_seconds: u32,

    /// Maximum time to wait for one execution, in seconds
    ///
    /// Always strictly less than `interval_seconds`.
    pub timeout_seconds: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Check {
    /// Interval as a [`std::time::Duration`] for the scheduler.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.interval_seconds))
    }

    /// Timeout as a [`std::time::Duration`] for the task context.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.timeout_seconds))
    }
}

/// Supported probe kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Http,
    Ping,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::Http => write!(f, "http"),
            CheckKind::Ping => write!(f, "ping"),
        }
    }
}

/// Outcome of a single probe execution.
///
/// One row per firing; this stream feeds both dashboards and alert
/// evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckHistory {
    pub id: i64,

    /// Check that produced this observation
    pub check_id: i64,

    /// Classified outcome
    pub status: CheckStatus,

    /// Round-trip time in milliseconds, when one was measured
    pub response_time_ms: Option<i64>,

    /// HTTP status code (http checks only)
    pub status_code: Option<u16>,

    /// Failure detail or probe message, at most 1000 chars
    pub error_message: Option<String>,

    /// When the probe executed
    pub checked_at: DateTime<Utc>,
}

impl CheckHistory {
    /// Observation for a check that produced a measurable outcome.
    pub fn new(check_id: i64, status: CheckStatus) -> Self {
        Self {
            id: 0,
            check_id,
            status,
            response_time_ms: None,
            status_code: None,
            error_message: None,
            checked_at: Utc::now(),
        }
    }

    pub fn with_response_time(mut self, ms: i64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Classified outcome of one probe execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
    Error,
    Timeout,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Up => write!(f, "up"),
            CheckStatus::Down => write!(f, "down"),
            CheckStatus::Error => write!(f, "error"),
            CheckStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// A remote metric source pushing snapshots to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,

    /// Human-readable identifier, unique across all agents
    pub name: String,

    pub enabled: bool,

    /// Expected reporting cadence in seconds
    pub interval_seconds: u32,

    /// Token the agent authenticates with (32..128 chars)
    pub auth_token: String,

    /// Liveness state as last evaluated by the engine
    pub status: AgentStatus,

    /// Most recent metric receipt; `None` means the agent never reported
    pub last_seen_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Agent liveness states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Online => write!(f, "online"),
            AgentStatus::Offline => write!(f, "offline"),
        }
    }
}

/// One metric snapshot from an agent, or a synthetic offline record.
///
/// A single collection cycle lands as one row. When the liveness loop finds
/// an agent silent, it appends a synthetic row with `is_offline = true` and
/// every metric zeroed - the timeline stays continuous either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHistory {
    pub id: i64,

    /// Agent that produced this snapshot
    pub agent_id: i64,

    /// Marks a synthetic record emitted by the liveness loop
    pub is_offline: bool,

    /// How long the agent spent collecting, in milliseconds
    pub collect_duration_ms: i64,

    pub cpu_load_1: f64,
    pub cpu_load_5: f64,
    pub cpu_load_15: f64,
    pub cpu_usage_percent: f64,

    pub memory_total_mb: i64,
    pub memory_used_mb: i64,
    pub memory_available_mb: i64,
    pub memory_usage_percent: f64,

    pub disk_total_gb: i64,
    pub disk_used_gb: i64,
    pub disk_usage_percent: f64,

    /// When the metrics were collected (or the liveness tick fired)
    pub collected_at: DateTime<Utc>,
}

impl AgentHistory {
    /// Synthetic record for an agent that missed its reporting window.
    ///
    /// All metric fields are zero by construction; repeated liveness ticks
    /// produce repeated rows on purpose.
    pub fn offline(agent_id: i64, at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            agent_id,
            is_offline: true,
            collect_duration_ms: 0,
            cpu_load_1: 0.0,
            cpu_load_5: 0.0,
            cpu_load_15: 0.0,
            cpu_usage_percent: 0.0,
            memory_total_mb: 0,
            memory_used_mb: 0,
            memory_available_mb: 0,
            memory_usage_percent: 0.0,
            disk_total_gb: 0,
            disk_used_gb: 0,
            disk_usage_percent: 0.0,
            collected_at: at,
        }
    }
}

/// A notification rule bound to exactly one check or one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,

    /// Owning check, mutually exclusive with `agent_id`
    pub check_id: Option<i64>,

    /// Owning agent, mutually exclusive with `check_id`
    pub agent_id: Option<i64>,

    /// Delivery channel
    pub kind: AlertKind,

    /// Channel-specific JSON configuration
    ///
    /// Telegram/Bale: `{"token": "...", "chat_id": "..."}`
    /// Email: `{"smtp_host": "...", "to": "..."}`
    /// Webhook: `{"url": "..."}`
    pub config: String,

    /// Condition that fires this alert
    pub condition: AlertCondition,

    /// Threshold for the percentage-based conditions, ignored otherwise
    pub condition_value: Option<f64>,

    pub enabled: bool,

    pub created_at: DateTime<Utc>,
}

/// Supported alert delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Telegram,
    Bale,
    Email,
    Webhook,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Telegram => write!(f, "telegram"),
            AlertKind::Bale => write!(f, "bale"),
            AlertKind::Email => write!(f, "email"),
            AlertKind::Webhook => write!(f, "webhook"),
        }
    }
}

/// Conditions an alert can fire on.
///
/// The first three belong to check alerts, the rest to agent alerts; the
/// validator enforces the pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    StatusDown,
    StatusTimeout,
    StatusError,
    CpuUsageHigh,
    MemoryUsageHigh,
    DiskUsageHigh,
    AgentOffline,
}

impl AlertCondition {
    /// Whether this condition is valid for an alert bound to a check.
    pub fn is_check_condition(self) -> bool {
        matches!(
            self,
            AlertCondition::StatusDown | AlertCondition::StatusTimeout | AlertCondition::StatusError
        )
    }

    /// Whether this condition is valid for an alert bound to an agent.
    pub fn is_agent_condition(self) -> bool {
        !self.is_check_condition()
    }

    /// Whether this condition compares a percentage against a threshold.
    pub fn needs_value(self) -> bool {
        matches!(
            self,
            AlertCondition::CpuUsageHigh
                | AlertCondition::MemoryUsageHigh
                | AlertCondition::DiskUsageHigh
        )
    }

    /// The check status this condition fires on, if it is a check condition.
    pub fn matching_status(self) -> Option<CheckStatus> {
        match self {
            AlertCondition::StatusDown => Some(CheckStatus::Down),
            AlertCondition::StatusTimeout => Some(CheckStatus::Timeout),
            AlertCondition::StatusError => Some(CheckStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertCondition::StatusDown => "status_down",
            AlertCondition::StatusTimeout => "status_timeout",
            AlertCondition::StatusError => "status_error",
            AlertCondition::CpuUsageHigh => "cpu_usage_high",
            AlertCondition::MemoryUsageHigh => "memory_usage_high",
            AlertCondition::DiskUsageHigh => "disk_usage_high",
            AlertCondition::AgentOffline => "agent_offline",
        };
        write!(f, "{s}")
    }
}

/// Audit record of one alert dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistory {
    pub id: i64,

    /// Alert rule that fired
    pub alert_id: i64,

    /// Check observation that triggered the dispatch, when applicable
    pub check_result_id: Option<i64>,

    /// Agent snapshot that triggered the dispatch, when applicable
    pub agent_metric_id: Option<i64>,

    /// Short summary, at most 200 chars
    pub title: String,

    /// Rendered message body, at most 5000 chars
    pub message: String,

    /// Delivery outcome
    pub status: AlertDeliveryStatus,

    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Delivery outcome of an alert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDeliveryStatus {
    Sent,
    Failed,
    Pending,
}

impl std::fmt::Display for AlertDeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertDeliveryStatus::Sent => write!(f, "sent"),
            AlertDeliveryStatus::Failed => write!(f, "failed"),
            AlertDeliveryStatus::Pending => write!(f, "pending"),
        }
    }
}

/// An administrator account for the dashboard.
///
/// The engine never authenticates anyone; the entity lives here so the
/// validator can guard it on the way into storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: i64,

    /// Login name, unique
    pub username: String,

    /// Password hash - never plaintext
    pub password: String,

    /// Display name
    pub full_name: String,
}
