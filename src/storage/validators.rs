//! Validation and normalization for every entity entering storage
//!
//! All validators are pure functions over `&mut` entities: they enforce
//! invariants and write normalized values back (canonical config JSON,
//! auto-generated tokens, zeroed offline metrics). Timestamps are never
//! touched here - entity lifecycle hooks own those.
//!
//! Probe config validation reads a process-wide set of defaults installed
//! once at startup via [`install_defaults`]. The `*_with_defaults` variants
//! accept explicit defaults instead and are what tests use.
//!
//! Errors are descriptive strings; callers only branch on presence, never
//! on the message text.

use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::sync::OnceLock;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

use super::schema::{
    Admin, Agent, AgentHistory, Alert, AlertHistory, AlertKind, Check, CheckHistory, CheckKind,
};

/// A rejected entity or config document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Result type alias for validators.
pub type ValidationResult<T = ()> = Result<T, ValidationError>;

macro_rules! reject {
    ($($arg:tt)*) => {
        return Err(ValidationError::new(format!($($arg)*)))
    };
}

// ---------------------------------------------------------------------------
// Probe defaults
// ---------------------------------------------------------------------------

/// Default configuration values for HTTP checks.
///
/// Applied during validation when user-provided config fields are missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpDefaults {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub expected_status: u16,
    pub expected_content: String,
    pub follow_redirects: bool,
    pub verify_ssl: bool,
    pub timeout_seconds: u32,
}

impl HttpDefaults {
    /// The defaults the engine ships with: plain GET expecting 200.
    pub fn standard() -> Self {
        Self {
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: String::new(),
            expected_status: 200,
            expected_content: String::new(),
            follow_redirects: true,
            verify_ssl: true,
            timeout_seconds: 30,
        }
    }
}

/// Default configuration values for ping checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PingDefaults {
    pub count: u32,
    pub interval_ms: u32,
    pub packet_size: u32,
    pub timeout_seconds: u32,
}

impl PingDefaults {
    /// The defaults the engine ships with: 3 packets, 1 s apart, 56 bytes.
    pub fn standard() -> Self {
        Self {
            count: 3,
            interval_ms: 1000,
            packet_size: 56,
            timeout_seconds: 5,
        }
    }
}

/// The pair of probe default sets validation reads from.
#[derive(Debug, Clone, Default)]
pub struct ProbeDefaults {
    pub http: HttpDefaults,
    pub ping: PingDefaults,
}

static GLOBAL_DEFAULTS: OnceLock<ProbeDefaults> = OnceLock::new();

/// Install the process-wide probe defaults.
///
/// Must run during startup before any check validation. A second call is
/// ignored; the first installation wins.
pub fn install_defaults(defaults: ProbeDefaults) {
    let _ = GLOBAL_DEFAULTS.set(defaults);
}

/// The installed defaults, if any.
pub fn installed_defaults() -> Option<&'static ProbeDefaults> {
    GLOBAL_DEFAULTS.get()
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Validate a [`Check`] and canonicalize its config in place.
///
/// Enforces name, interval, and timeout invariants, then validates the
/// target and configuration according to the check kind. Reads the
/// installed global defaults; see [`validate_check_with_defaults`] for the
/// explicit variant.
pub fn validate_check(check: &mut Check) -> ValidationResult {
    validate_check_inner(check, installed_defaults())
}

/// [`validate_check`] with an explicit defaults set instead of the
/// installed globals.
pub fn validate_check_with_defaults(check: &mut Check, defaults: &ProbeDefaults) -> ValidationResult {
    validate_check_inner(check, Some(defaults))
}

fn validate_check_inner(check: &mut Check, defaults: Option<&ProbeDefaults>) -> ValidationResult {
    if check.name.is_empty() {
        reject!("check name cannot be empty");
    }
    if check.name.len() > 100 {
        reject!("check name too long (max 100 chars)");
    }
    if !is_valid_entity_name(&check.name) {
        reject!("check name contains invalid characters (letters, digits, space, '-', '_' allowed)");
    }

    if check.target.is_empty() {
        reject!("check target cannot be empty");
    }
    match check.kind {
        CheckKind::Http => validate_http_target(&check.target)?,
        CheckKind::Ping => validate_ping_target(&check.target)?,
    }

    if check.interval_seconds < 5 {
        reject!("check interval too short (minimum 5 seconds)");
    }
    if check.interval_seconds > 86_400 {
        reject!("check interval too long (maximum 24 hours)");
    }
    if check.timeout_seconds < 1 {
        reject!("check timeout too short (minimum 1 second)");
    }
    if check.timeout_seconds > 300 {
        reject!("check timeout too long (maximum 5 minutes)");
    }
    if check.timeout_seconds >= check.interval_seconds {
        reject!("check timeout must be less than interval");
    }

    check.config = match check.kind {
        CheckKind::Http => validate_http_config(&check.config, defaults.map(|d| &d.http))?,
        CheckKind::Ping => validate_ping_config(&check.config, defaults.map(|d| &d.ping))?,
    };

    Ok(())
}

/// Allowed characters for check and agent names.
fn is_valid_entity_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_')
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Validate an HTTP(S) target URL.
///
/// Schemeless targets are treated as `https://`; only http and https pass.
fn validate_http_target(target: &str) -> ValidationResult {
    let candidate = if target.contains("://") {
        target.to_string()
    } else {
        format!("https://{target}")
    };

    let parsed = match Url::parse(&candidate) {
        Ok(url) => url,
        Err(err) => reject!("invalid URL format: {err}"),
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        reject!(
            "invalid scheme: {} (only http and https supported)",
            parsed.scheme()
        );
    }

    let host = match parsed.host() {
        Some(host) => host,
        None => reject!("missing host"),
    };

    match host {
        // IP literals pass as-is
        Host::Ipv4(_) | Host::Ipv6(_) => Ok(()),
        Host::Domain(domain) => {
            if domain.len() > 253 {
                reject!("hostname too long");
            }
            if domain == "localhost" {
                return Ok(());
            }
            // Reject plain words like "example"
            if !domain.contains('.') {
                reject!("invalid hostname");
            }
            validate_hostname(domain)
        }
    }
}

/// Validate a ping target: strict IPv4, IPv6, or a hostname.
fn validate_ping_target(target: &str) -> ValidationResult {
    if target.is_empty() {
        reject!("ping target cannot be empty");
    }

    if is_strict_ipv4(target) || is_valid_ipv6(target) {
        return Ok(());
    }

    // A hostname must contain at least one letter; anything else is a
    // malformed address
    if !target.chars().any(|c| c.is_ascii_alphabetic()) {
        reject!("target is not a valid IP address or hostname");
    }

    validate_hostname(target)
}

/// Strict dotted-quad IPv4: four octets in 0..=255, no leading zeros.
fn is_strict_ipv4(ip: &str) -> bool {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|part| {
        if part.is_empty() || part.len() > 3 {
            return false;
        }
        if part.len() > 1 && part.starts_with('0') {
            return false;
        }
        if !part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        part.parse::<u16>().is_ok_and(|octet| octet <= 255)
    })
}

/// IPv6 literal: must contain `:`, parse, and not be an IPv4-mapped form.
fn is_valid_ipv6(ip: &str) -> bool {
    if !ip.contains(':') {
        return false;
    }
    match ip.parse::<Ipv6Addr>() {
        Ok(addr) => addr.to_ipv4_mapped().is_none(),
        Err(_) => false,
    }
}

/// DNS hostname rules: length, dot placement, and character set.
fn validate_hostname(host: &str) -> ValidationResult {
    if host.len() > 253 {
        reject!("hostname too long (max 253 chars)");
    }
    if host.contains("..") || host.starts_with('.') || host.ends_with('.') {
        reject!("invalid hostname format");
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        reject!("hostname contains invalid characters");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Probe configs
// ---------------------------------------------------------------------------

/// Canonical form of an HTTP check's configuration.
///
/// Field order here is the canonical serialization order; headers are a
/// `BTreeMap` so re-serializing a validated document is byte-stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCheckConfig {
    /// HTTP method (e.g. GET, POST), upper-cased
    pub method: String,
    /// Custom request headers
    pub headers: BTreeMap<String, String>,
    /// Request body
    pub body: String,
    /// Expected HTTP status code
    pub expected_status: u16,
    /// Substring expected in the response body
    pub expected_content: String,
    /// Whether to follow HTTP redirects
    pub follow_redirects: bool,
    /// Whether to verify TLS certificates
    pub verify_ssl: bool,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
}

/// User-supplied HTTP config fields; anything absent keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpConfigPatch {
    method: Option<String>,
    headers: Option<BTreeMap<String, String>>,
    body: Option<String>,
    expected_status: Option<u16>,
    expected_content: Option<String>,
    follow_redirects: Option<bool>,
    verify_ssl: Option<bool>,
    timeout_seconds: Option<u32>,
}

const VALID_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"];

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Validate and canonicalize an HTTP check configuration document.
///
/// Defaults are layered: built-ins, then `defaults`, then the user JSON,
/// each overriding per field (headers merge per key). The returned string
/// is what probes parse at execution time.
pub fn validate_http_config(
    config_str: &str,
    defaults: Option<&HttpDefaults>,
) -> ValidationResult<String> {
    let mut cfg = HttpCheckConfig {
        method: "GET".to_string(),
        headers: BTreeMap::new(),
        body: String::new(),
        expected_status: 200,
        expected_content: String::new(),
        follow_redirects: true,
        verify_ssl: true,
        timeout_seconds: 30,
    };

    if let Some(defaults) = defaults {
        if !defaults.method.is_empty() {
            cfg.method = defaults.method.clone();
        }
        if defaults.expected_status != 0 {
            cfg.expected_status = defaults.expected_status;
        }
        cfg.follow_redirects = defaults.follow_redirects;
        cfg.verify_ssl = defaults.verify_ssl;
        for (k, v) in &defaults.headers {
            cfg.headers.insert(k.clone(), v.clone());
        }
        if !defaults.body.is_empty() {
            cfg.body = defaults.body.clone();
        }
        if !defaults.expected_content.is_empty() {
            cfg.expected_content = defaults.expected_content.clone();
        }
        if defaults.timeout_seconds != 0 {
            cfg.timeout_seconds = defaults.timeout_seconds;
        }
    }

    if !config_str.is_empty() && config_str != "{}" {
        let patch: HttpConfigPatch = match serde_json::from_str(config_str) {
            Ok(patch) => patch,
            Err(err) => reject!("invalid JSON format: {err}"),
        };
        if let Some(method) = patch.method {
            cfg.method = method;
        }
        if let Some(headers) = patch.headers {
            // User headers override defaults per key
            for (k, v) in headers {
                cfg.headers.insert(k, v);
            }
        }
        if let Some(body) = patch.body {
            cfg.body = body;
        }
        if let Some(status) = patch.expected_status {
            cfg.expected_status = status;
        }
        if let Some(content) = patch.expected_content {
            cfg.expected_content = content;
        }
        if let Some(follow) = patch.follow_redirects {
            cfg.follow_redirects = follow;
        }
        if let Some(verify) = patch.verify_ssl {
            cfg.verify_ssl = verify;
        }
        if let Some(timeout) = patch.timeout_seconds {
            cfg.timeout_seconds = timeout;
        }
    }

    cfg.method = cfg.method.to_ascii_uppercase();
    if !VALID_METHODS.contains(&cfg.method.as_str()) {
        reject!(
            "invalid HTTP method: {} (supported: GET, POST, PUT, DELETE, HEAD, OPTIONS, PATCH)",
            cfg.method
        );
    }

    if cfg.expected_status < 100 || cfg.expected_status > 599 {
        reject!(
            "invalid expected status code: {} (must be between 100-599)",
            cfg.expected_status
        );
    }

    for (key, value) in &cfg.headers {
        if key.is_empty() {
            reject!("header key cannot be empty");
        }
        if key.len() > 100 {
            reject!("header key too long: {key} (max 100 chars)");
        }
        if value.len() > 1000 {
            reject!("header value too long for key {key} (max 1000 chars)");
        }
    }

    if cfg.body.len() > MAX_BODY_BYTES {
        reject!("request body too large (max 10MB)");
    }
    if cfg.expected_content.len() > 1000 {
        reject!("expected content too long (max 1000 chars)");
    }

    match serde_json::to_string(&cfg) {
        Ok(canonical) => Ok(canonical),
        Err(err) => reject!("failed to serialize validated config: {err}"),
    }
}

/// Canonical form of a ping check's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingCheckConfig {
    /// Number of ICMP echo requests to send
    pub count: u32,
    /// Interval between packets in milliseconds
    pub interval: u32,
    /// Payload size of each packet in bytes
    pub size: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PingConfigPatch {
    count: Option<u32>,
    interval: Option<u32>,
    size: Option<u32>,
}

/// Validate and canonicalize a ping check configuration document.
pub fn validate_ping_config(
    config_str: &str,
    defaults: Option<&PingDefaults>,
) -> ValidationResult<String> {
    let mut cfg = PingCheckConfig {
        count: 3,
        interval: 300,
        size: 56,
    };

    if let Some(defaults) = defaults {
        if defaults.count != 0 {
            cfg.count = defaults.count;
        }
        if defaults.interval_ms != 0 {
            cfg.interval = defaults.interval_ms;
        }
        if defaults.packet_size != 0 {
            cfg.size = defaults.packet_size;
        }
    }

    if !config_str.is_empty() && config_str != "{}" {
        let patch: PingConfigPatch = match serde_json::from_str(config_str) {
            Ok(patch) => patch,
            Err(err) => reject!("invalid JSON format: {err}"),
        };
        if let Some(count) = patch.count {
            cfg.count = count;
        }
        if let Some(interval) = patch.interval {
            cfg.interval = interval;
        }
        if let Some(size) = patch.size {
            cfg.size = size;
        }
    }

    if cfg.count == 0 || cfg.count > 10 {
        reject!("invalid count: {} (must be between 1-10)", cfg.count);
    }
    if cfg.interval < 100 || cfg.interval > 10_000 {
        reject!(
            "invalid interval: {} ms (must be between 100-10000)",
            cfg.interval
        );
    }
    if cfg.size < 8 || cfg.size > 1472 {
        reject!(
            "invalid packet size: {} bytes (must be between 8-1472)",
            cfg.size
        );
    }

    match serde_json::to_string(&cfg) {
        Ok(canonical) => Ok(canonical),
        Err(err) => reject!("failed to serialize validated config: {err}"),
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Validate an [`Agent`], generating an auth token when absent.
pub fn validate_agent(agent: &mut Agent) -> ValidationResult {
    if agent.name.is_empty() {
        reject!("agent name cannot be empty");
    }
    if agent.name.len() > 100 {
        reject!("agent name too long (max 100 chars)");
    }
    if !is_valid_entity_name(&agent.name) {
        reject!("agent name contains invalid characters (letters, digits, space, '-', '_' allowed)");
    }

    if agent.interval_seconds < 10 {
        reject!("agent interval too short (minimum 10 seconds)");
    }
    if agent.interval_seconds > 86_400 {
        reject!("agent interval too long (maximum 24 hours)");
    }

    if agent.auth_token.is_empty() {
        agent.auth_token = generate_auth_token();
    }
    if agent.auth_token.len() < 32 {
        reject!("auth token too short (minimum 32 chars)");
    }
    if agent.auth_token.len() > 128 {
        reject!("auth token too long (maximum 128 chars)");
    }

    Ok(())
}

/// Cryptographically random token, 64 hex characters.
fn generate_auth_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

/// Validate an [`Alert`] with owner-aware condition rules.
///
/// Exactly one of `check_id` / `agent_id` must be set; the condition must
/// belong to that owner kind; percentage thresholds require a value in
/// [0, 100]; the channel config must satisfy its per-kind schema.
pub fn validate_alert(alert: &mut Alert) -> ValidationResult {
    let has_check = alert.check_id.is_some();
    let has_agent = alert.agent_id.is_some();
    if !has_check && !has_agent {
        reject!("alert must be associated with either a check or an agent");
    }
    if has_check && has_agent {
        reject!("alert cannot be associated with both a check and an agent");
    }

    if has_check && !alert.condition.is_check_condition() {
        reject!(
            "invalid condition type for check alert: {} (supported: status_down, status_timeout, status_error)",
            alert.condition
        );
    }
    if has_agent && !alert.condition.is_agent_condition() {
        reject!(
            "invalid condition type for agent alert: {} (supported: cpu_usage_high, memory_usage_high, disk_usage_high, agent_offline)",
            alert.condition
        );
    }

    if alert.condition.needs_value() {
        match alert.condition_value {
            None => reject!(
                "condition value is required for condition type: {}",
                alert.condition
            ),
            Some(value) if !(0.0..=100.0).contains(&value) => {
                reject!("condition value must be between 0 and 100 for percentage-based conditions")
            }
            Some(_) => {}
        }
    }

    validate_alert_channel_config(alert.kind, &alert.config)?;

    Ok(())
}

/// Validate the channel-specific config document for an alert kind.
fn validate_alert_channel_config(kind: AlertKind, config_str: &str) -> ValidationResult {
    // Empty config is allowed; channels fall back to server-wide settings
    if config_str.is_empty() || config_str == "{}" {
        return Ok(());
    }

    let config: serde_json::Map<String, serde_json::Value> =
        match serde_json::from_str(config_str) {
            Ok(map) => map,
            Err(err) => reject!("invalid JSON format: {err}"),
        };

    match kind {
        AlertKind::Telegram => validate_bot_config(&config, "telegram"),
        AlertKind::Bale => validate_bot_config(&config, "bale"),
        AlertKind::Email => validate_email_config(&config),
        AlertKind::Webhook => validate_webhook_config(&config),
    }
}

/// Shared schema for bot-style channels (Telegram and Bale).
fn validate_bot_config(
    config: &serde_json::Map<String, serde_json::Value>,
    channel: &str,
) -> ValidationResult {
    if let Some(token) = config.get("token") {
        let Some(token) = token.as_str() else {
            reject!("{channel} token must be a string");
        };
        if token.len() < 10 {
            reject!("{channel} token too short");
        }
    }

    if let Some(chat_id) = config.get("chat_id") {
        let Some(chat_id) = chat_id.as_str() else {
            reject!("{channel} chat_id must be a string");
        };
        if chat_id.is_empty() {
            reject!("{channel} chat_id cannot be empty");
        }
    }

    Ok(())
}

fn validate_email_config(config: &serde_json::Map<String, serde_json::Value>) -> ValidationResult {
    if let Some(host) = config.get("smtp_host") {
        let Some(host) = host.as_str() else {
            reject!("smtp_host must be a string");
        };
        if host.is_empty() {
            reject!("smtp_host cannot be empty");
        }
    }

    if let Some(to) = config.get("to") {
        let Some(to) = to.as_str() else {
            reject!("email 'to' field must be a string");
        };
        if !to.contains('@') {
            reject!("invalid email format");
        }
    }

    Ok(())
}

fn validate_webhook_config(config: &serde_json::Map<String, serde_json::Value>) -> ValidationResult {
    if let Some(url) = config.get("url") {
        let Some(url) = url.as_str() else {
            reject!("webhook URL must be a string");
        };
        if let Err(err) = Url::parse(url) {
            reject!("invalid webhook URL: {err}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Histories
// ---------------------------------------------------------------------------

/// Validate an [`AlertHistory`] record before persistence.
pub fn validate_alert_history(history: &AlertHistory) -> ValidationResult {
    if history.alert_id == 0 {
        reject!("alert ID cannot be empty");
    }
    if history.title.is_empty() {
        reject!("alert title cannot be empty");
    }
    if history.title.len() > 200 {
        reject!("alert title too long (max 200 chars)");
    }
    if history.message.is_empty() {
        reject!("alert message cannot be empty");
    }
    if history.message.len() > 5000 {
        reject!("alert message too long (max 5000 chars)");
    }
    Ok(())
}

/// Validate a [`CheckHistory`] observation before persistence.
pub fn validate_check_history(history: &CheckHistory) -> ValidationResult {
    if history.check_id == 0 {
        reject!("check ID cannot be empty");
    }
    if let Some(ms) = history.response_time_ms {
        if ms < 0 {
            reject!("response time cannot be negative");
        }
    }
    if let Some(code) = history.status_code {
        if !(100..=599).contains(&code) {
            reject!("invalid HTTP status code: {code}");
        }
    }
    if let Some(message) = &history.error_message {
        if message.len() > 1000 {
            reject!("error message too long (max 1000 chars)");
        }
    }
    Ok(())
}

/// Validate an [`AgentHistory`] snapshot, zeroing metrics when offline.
///
/// An offline record is the liveness loop's synthetic observation: all
/// metric fields are forced to zero so the stored timeline never mixes a
/// "missed report" with stale numbers.
pub fn validate_agent_history(history: &mut AgentHistory) -> ValidationResult {
    if history.agent_id == 0 {
        reject!("agent ID cannot be empty");
    }
    if history.collect_duration_ms < 0 {
        reject!("collect duration cannot be negative");
    }

    if history.is_offline {
        if history.collect_duration_ms != 0 {
            reject!("offline history must have zero collect duration");
        }
        history.cpu_load_1 = 0.0;
        history.cpu_load_5 = 0.0;
        history.cpu_load_15 = 0.0;
        history.cpu_usage_percent = 0.0;
        history.memory_total_mb = 0;
        history.memory_used_mb = 0;
        history.memory_available_mb = 0;
        history.memory_usage_percent = 0.0;
        history.disk_total_gb = 0;
        history.disk_used_gb = 0;
        history.disk_usage_percent = 0.0;
        return Ok(());
    }

    if history.cpu_load_1 < 0.0 || history.cpu_load_5 < 0.0 || history.cpu_load_15 < 0.0 {
        reject!("CPU load values cannot be negative");
    }
    if !(0.0..=100.0).contains(&history.cpu_usage_percent) {
        reject!("CPU usage percent must be between 0 and 100");
    }
    if history.memory_total_mb <= 0 {
        reject!("memory total must be positive");
    }
    if history.memory_used_mb < 0 || history.memory_available_mb < 0 {
        reject!("memory values cannot be negative");
    }
    if !(0.0..=100.0).contains(&history.memory_usage_percent) {
        reject!("memory usage percent must be between 0 and 100");
    }
    if history.disk_total_gb <= 0 {
        reject!("disk total must be positive");
    }
    if history.disk_used_gb < 0 {
        reject!("disk used cannot be negative");
    }
    if !(0.0..=100.0).contains(&history.disk_usage_percent) {
        reject!("disk usage percent must be between 0 and 100");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// Validate an [`Admin`] account record.
///
/// The password field is assumed to hold a hash already; length bounds fit
/// bcrypt output.
pub fn validate_admin(admin: &Admin) -> ValidationResult {
    if admin.username.is_empty() {
        reject!("username cannot be empty");
    }
    if admin.username.len() < 3 {
        reject!("username too short (minimum 3 chars)");
    }
    if admin.username.len() > 50 {
        reject!("username too long (max 50 chars)");
    }
    if !admin
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        reject!("username contains invalid characters (only alphanumeric and underscores allowed)");
    }

    if admin.password.is_empty() {
        reject!("password cannot be empty");
    }
    if admin.password.len() < 8 {
        reject!("password too short (minimum 8 chars)");
    }
    if admin.password.len() > 255 {
        reject!("password too long (max 255 chars)");
    }

    if admin.full_name.is_empty() {
        reject!("full name cannot be empty");
    }
    if admin.full_name.len() > 100 {
        reject!("full name too long (max 100 chars)");
    }

    Ok(())
}
