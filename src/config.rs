//! Engine configuration
//!
//! The engine consumes validated configuration structures only; loading is
//! a thin serde layer over a JSON file with every section optional and
//! defaulted.

use serde::Deserialize;
use tracing::trace;

use crate::scheduler::SchedulerConfig;
use crate::storage::validators::{
    validate_http_config, validate_ping_config, HttpDefaults, PingDefaults, ProbeDefaults,
};

/// Top-level configuration for the monitoring engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub checks: ChecksConfig,
    pub alert: AlertConfig,
}

/// Default configuration applied to checks that leave fields unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    pub http: HttpDefaults,
    pub ping: PingDefaults,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            http: HttpDefaults::standard(),
            ping: PingDefaults::standard(),
        }
    }
}

/// Alert transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Webhook endpoint alerts are posted to; unset means log-only
    pub webhook_url: Option<String>,

    /// Transport timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: 30,
        }
    }
}

impl Config {
    /// Validate bounds across every section.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.scheduler.validate()?;

        // The probe defaults must themselves pass config validation,
        // otherwise every check would fail at probe time
        validate_http_config("{}", Some(&self.checks.http))
            .map_err(|err| anyhow::anyhow!("checks.http: {err}"))?;
        validate_ping_config("{}", Some(&self.checks.ping))
            .map_err(|err| anyhow::anyhow!("checks.ping: {err}"))?;

        if self.alert.timeout_seconds == 0 {
            anyhow::bail!("alert.timeout_seconds must be greater than 0");
        }
        if self.alert.timeout_seconds > 120 {
            anyhow::bail!("alert.timeout_seconds too large (max 2m)");
        }

        Ok(())
    }

    /// The probe defaults to install into the validator at startup.
    pub fn probe_defaults(&self) -> ProbeDefaults {
        ProbeDefaults {
            http: self.checks.http.clone(),
            ping: self.checks.ping.clone(),
        }
    }
}

/// Load configuration from a JSON file and validate it.
pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&file_content)
        .map_err(|err| anyhow::anyhow!("invalid configuration file: {err}"))?;
    trace!("loaded config: {config:?}");
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.scheduler.worker_count, 8);
        assert_eq!(config.scheduler.max_retries, 3);
        assert_eq!(config.checks.ping.count, 3);
        assert_eq!(config.checks.http.expected_status, 200);
    }

    #[test]
    fn parses_partial_documents() {
        let config: Config =
            serde_json::from_str(r#"{"scheduler": {"worker_count": 2}}"#).unwrap();
        assert_eq!(config.scheduler.worker_count, 2);
        assert_eq!(config.scheduler.max_retries, 3);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_bounds_sections() {
        let config: Config =
            serde_json::from_str(r#"{"scheduler": {"worker_count": 0}}"#).unwrap();
        assert!(config.validate().is_err());

        let config: Config =
            serde_json::from_str(r#"{"checks": {"ping": {"count": 99}}}"#).unwrap();
        assert!(config.validate().is_err());

        let config: Config =
            serde_json::from_str(r#"{"alert": {"timeout_seconds": 0}}"#).unwrap();
        assert!(config.validate().is_err());
    }
}
