//! ICMP ping probe
//!
//! Shells out to the platform `ping` utility and parses its summary
//! output. Both the Unix and Windows output dialects are recognized, so
//! parsing does not depend on the build target. The spawned process is
//! killed when the probe future is dropped, which is how engine-level
//! timeouts cancel a slow ping.

use std::net::IpAddr;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::trace;

use crate::storage::schema::{Check, CheckHistory, CheckKind, CheckStatus};
use crate::storage::validators::{validate_ping_config, PingCheckConfig, PingDefaults};

use super::{Probe, ProbeError};

/// ICMP ping monitoring probe.
pub struct PingProbe {
    defaults: PingDefaults,
}

/// Parsed summary of one ping run.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PingStats {
    received: u32,
    packet_loss: f64,
    avg_rtt_ms: f64,
}

impl PingProbe {
    pub fn new(defaults: PingDefaults) -> Self {
        Self { defaults }
    }

    /// Parse the check's config document, guarded by the same bounds the
    /// validator enforces.
    fn parse_config(&self, config_str: &str) -> Result<PingCheckConfig, ProbeError> {
        let canonical = validate_ping_config(config_str, Some(&self.defaults))
            .map_err(|err| ProbeError::Config(err.to_string()))?;
        serde_json::from_str(&canonical).map_err(|err| ProbeError::Config(err.to_string()))
    }

    /// Resolve the target to an IP, preferring IPv4 over IPv6.
    async fn resolve_target(&self, target: &str) -> Result<IpAddr, ProbeError> {
        if let Ok(ip) = target.parse::<IpAddr>() {
            return Ok(ip);
        }

        let addrs: Vec<IpAddr> = tokio::net::lookup_host(format!("{target}:0"))
            .await
            .map_err(|err| {
                ProbeError::Failed(format!("failed to resolve hostname {target}: {err}"))
            })?
            .map(|sa| sa.ip())
            .collect();

        addrs
            .iter()
            .copied()
            .find(IpAddr::is_ipv4)
            .or_else(|| addrs.first().copied())
            .ok_or_else(|| {
                ProbeError::Failed(format!("no IP addresses found for hostname {target}"))
            })
    }

    /// Platform-specific argument list for one ping run.
    fn build_args(&self, target: IpAddr, cfg: &PingCheckConfig) -> Vec<String> {
        let timeout_seconds = self.defaults.timeout_seconds.max(1);
        if cfg!(windows) {
            vec![
                "-n".to_string(),
                cfg.count.to_string(),
                "-w".to_string(),
                (timeout_seconds * 1000).to_string(),
                "-l".to_string(),
                cfg.size.to_string(),
                target.to_string(),
            ]
        } else {
            vec![
                "-c".to_string(),
                cfg.count.to_string(),
                "-i".to_string(),
                format!("{:.3}", f64::from(cfg.interval) / 1000.0),
                "-s".to_string(),
                cfg.size.to_string(),
                "-W".to_string(),
                timeout_seconds.to_string(),
                target.to_string(),
            ]
        }
    }
}

#[async_trait]
impl Probe for PingProbe {
    fn kind(&self) -> CheckKind {
        CheckKind::Ping
    }

    async fn run(&self, check: &Check) -> Result<CheckHistory, ProbeError> {
        let cfg = self.parse_config(&check.config)?;
        let target = self.resolve_target(&check.target).await?;
        let args = self.build_args(target, &cfg);

        trace!(target = %target, ?args, "running ping");
        let output = Command::new("ping")
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| ProbeError::Failed(format!("failed to execute ping: {err}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_ping_output(&stdout) {
            Some(stats) => Ok(ping_observation(check.id, stats)),
            None if output.status.success() => Err(ProbeError::Failed(format!(
                "failed to parse ping output: {stdout}"
            ))),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ProbeError::Failed(format!(
                    "ping command failed: {}",
                    if stderr.trim().is_empty() {
                        stdout.trim()
                    } else {
                        stderr.trim()
                    }
                )))
            }
        }
    }
}

/// Map parsed statistics onto an observation.
fn ping_observation(check_id: i64, stats: PingStats) -> CheckHistory {
    let response_time = stats.avg_rtt_ms.round() as i64;

    if stats.received == 0 {
        return CheckHistory::new(check_id, CheckStatus::Down)
            .with_response_time(response_time)
            .with_message("100% packet loss");
    }
    if stats.packet_loss > 50.0 {
        return CheckHistory::new(check_id, CheckStatus::Down)
            .with_response_time(response_time)
            .with_message(format!("{:.1}% packet loss", stats.packet_loss));
    }

    CheckHistory::new(check_id, CheckStatus::Up)
        .with_response_time(response_time)
        .with_message(format!("{:.1}% packet loss", stats.packet_loss))
}

/// Parse ping output in either the Unix or Windows dialect.
fn parse_ping_output(output: &str) -> Option<PingStats> {
    parse_unix_output(output).or_else(|| parse_windows_output(output))
}

/// Unix/Linux/macOS: summary lines like
/// `3 packets transmitted, 3 received, 0% packet loss` and
/// `rtt min/avg/max/mdev = 1.2/2.3/3.4/0.1 ms`.
fn parse_unix_output(output: &str) -> Option<PingStats> {
    static STATS_RE: OnceLock<Regex> = OnceLock::new();
    let stats_re = STATS_RE.get_or_init(|| {
        Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received, ([\d.]+)% packet loss")
            .expect("valid regex")
    });

    let caps = stats_re.captures(output)?;
    let received: u32 = caps[2].parse().ok()?;
    let packet_loss: f64 = caps[3].parse().ok()?;

    // rtt summary is absent when nothing came back
    static RTT_RE: OnceLock<Regex> = OnceLock::new();
    let rtt_re = RTT_RE.get_or_init(|| {
        Regex::new(
            r"(?:rtt|round-trip) min/avg/max/(?:mdev|stddev) = ([\d.]+)/([\d.]+)/([\d.]+)/([\d.]+) ms",
        )
        .expect("valid regex")
    });
    let avg_rtt_ms = rtt_re
        .captures(output)
        .and_then(|caps| caps[2].parse().ok())
        .unwrap_or(0.0);

    Some(PingStats {
        received,
        packet_loss,
        avg_rtt_ms,
    })
}

/// Windows: `Packets: Sent = 4, Received = 4, Lost = 0 (0% loss)` plus
/// per-reply `time=15ms` lines averaged.
fn parse_windows_output(output: &str) -> Option<PingStats> {
    static STATS_RE: OnceLock<Regex> = OnceLock::new();
    let stats_re = STATS_RE.get_or_init(|| {
        Regex::new(r"Packets: Sent = (\d+), Received = (\d+), Lost = \d+ \(([\d.]+)% loss\)")
            .expect("valid regex")
    });

    let caps = stats_re.captures(output)?;
    let received: u32 = caps[2].parse().ok()?;
    let packet_loss: f64 = caps[3].parse().ok()?;

    static RTT_RE: OnceLock<Regex> = OnceLock::new();
    let rtt_re = RTT_RE.get_or_init(|| Regex::new(r"time[=<](\d+)ms").expect("valid regex"));

    let mut total = 0.0;
    let mut count = 0u32;
    for caps in rtt_re.captures_iter(output) {
        if let Ok(rtt) = caps[1].parse::<f64>() {
            total += rtt;
            count += 1;
        }
    }
    let avg_rtt_ms = if count > 0 { total / f64::from(count) } else { 0.0 };

    Some(PingStats {
        received,
        packet_loss,
        avg_rtt_ms,
    })
}
