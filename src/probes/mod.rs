//! Probe implementations for monitoring checks
//!
//! A probe executes one [`Check`] and produces one [`CheckHistory`]
//! observation. Network-level failures are part of the job: a refused
//! connection or lost packet comes back as an `Ok` observation with the
//! classified status. `Err` is reserved for failures that prevented
//! producing any observation at all (bad config, unresolvable target) -
//! the engine synthesizes the error row in that case.
//!
//! Supported probe kinds:
//! - HTTP/HTTPS: monitor web endpoints
//! - Ping (ICMP): monitor network reachability

pub mod http;
pub mod ping;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::storage::schema::{Check, CheckHistory, CheckKind, CheckStatus};
use crate::storage::validators::ProbeDefaults;

pub use http::HttpProbe;
pub use ping::PingProbe;

/// Probe error kinds.
///
/// Each kind maps to exactly one observation status, so classification no
/// longer depends on matching substrings of I/O error messages. The
/// substring classifier survives as [`classify_failure`] for wrapped
/// errors whose kind is unknown.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out: {0}")]
    Timeout(String),

    #[error("target unreachable: {0}")]
    Unreachable(String),

    #[error("invalid probe configuration: {0}")]
    Config(String),

    #[error("unsupported check type: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

impl ProbeError {
    /// The observation status this error classifies to.
    pub fn status(&self) -> CheckStatus {
        match self {
            ProbeError::Timeout(_) => CheckStatus::Timeout,
            ProbeError::Unreachable(_) => CheckStatus::Down,
            ProbeError::Config(_) | ProbeError::Unsupported(_) => CheckStatus::Error,
            ProbeError::Failed(text) => classify_failure(text),
        }
    }
}

/// Classify a failure message into an observation status.
///
/// Total over arbitrary strings: every input maps to exactly one of
/// `timeout`, `down`, or `error`. Matching is case-insensitive since OS
/// error strings differ in capitalization across platforms.
pub fn classify_failure(text: &str) -> CheckStatus {
    let text = text.to_ascii_lowercase();
    if text.contains("timeout") || text.contains("timed out") || text.contains("deadline exceeded")
    {
        return CheckStatus::Timeout;
    }
    if text.contains("connection refused")
        || text.contains("no route to host")
        || text.contains("host unreachable")
        || text.contains("100% packet loss")
    {
        return CheckStatus::Down;
    }
    CheckStatus::Error
}

/// The contract every probe implementation satisfies.
#[async_trait]
pub trait Probe: Send + Sync {
    /// The check kind this probe handles.
    fn kind(&self) -> CheckKind;

    /// Execute the check and produce an observation.
    async fn run(&self, check: &Check) -> Result<CheckHistory, ProbeError>;
}

/// Routes a check to the probe registered for its kind.
pub struct ProbeDispatcher {
    probes: HashMap<CheckKind, Box<dyn Probe>>,
}

impl ProbeDispatcher {
    /// An empty dispatcher; call [`register`](Self::register) to populate.
    pub fn new() -> Self {
        Self {
            probes: HashMap::new(),
        }
    }

    /// Dispatcher with the built-in HTTP and ping probes registered,
    /// configured from the given defaults.
    pub fn with_standard_probes(defaults: &ProbeDefaults) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Box::new(HttpProbe::new(defaults.http.clone())));
        dispatcher.register(Box::new(PingProbe::new(defaults.ping.clone())));
        dispatcher
    }

    /// Register a probe under its kind. A later registration for the same
    /// kind replaces the earlier one.
    pub fn register(&mut self, probe: Box<dyn Probe>) {
        debug!(kind = %probe.kind(), "probe registered");
        self.probes.insert(probe.kind(), probe);
    }

    /// Execute a check via the probe registered for its kind.
    pub async fn execute(&self, check: &Check) -> Result<CheckHistory, ProbeError> {
        let probe = self
            .probes
            .get(&check.kind)
            .ok_or_else(|| ProbeError::Unsupported(check.kind.to_string()))?;

        debug!(check_id = check.id, kind = %check.kind, name = %check.name, "executing check");
        let result = probe.run(check).await;
        match &result {
            Ok(observation) => {
                debug!(check_id = check.id, status = %observation.status, "check completed")
            }
            Err(err) => debug!(check_id = check.id, error = %err, "check failed"),
        }
        result
    }

    /// The kinds this dispatcher can execute.
    pub fn supported_kinds(&self) -> Vec<CheckKind> {
        self.probes.keys().copied().collect()
    }
}

impl Default for ProbeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
