//! HTTP/HTTPS probe
//!
//! Builds a [`reqwest`] client per execution so each check's timeout,
//! redirect, and TLS settings apply cleanly, sends the configured request,
//! and classifies the response against the expected status code and
//! optional body substring.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;
use tracing::trace;

use crate::storage::schema::{Check, CheckHistory, CheckKind, CheckStatus};
use crate::storage::validators::{validate_http_config, HttpCheckConfig, HttpDefaults};

use super::{classify_failure, Probe, ProbeError};

/// Default User-Agent sent when the config does not set one.
const DEFAULT_USER_AGENT: &str = "Dideban-Monitor/1.0";

/// How much of the response body participates in content matching.
const CONTENT_CHECK_BYTES: usize = 1024;

/// HTTP/HTTPS monitoring probe.
pub struct HttpProbe {
    defaults: HttpDefaults,
}

impl HttpProbe {
    pub fn new(defaults: HttpDefaults) -> Self {
        Self { defaults }
    }

    /// Parse the check's config document, layering it over this probe's
    /// defaults. Method and expected status are re-guarded here even though
    /// the validator normally runs first.
    fn parse_config(&self, config_str: &str) -> Result<HttpCheckConfig, ProbeError> {
        let canonical = validate_http_config(config_str, Some(&self.defaults))
            .map_err(|err| ProbeError::Config(err.to_string()))?;
        serde_json::from_str(&canonical).map_err(|err| ProbeError::Config(err.to_string()))
    }

    fn build_client(&self, cfg: &HttpCheckConfig) -> Result<reqwest::Client, ProbeError> {
        let redirect = if cfg.follow_redirects {
            // Bound redirect chains to avoid loops
            Policy::limited(10)
        } else {
            Policy::none()
        };

        let mut builder = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(u64::from(cfg.timeout_seconds)))
            .redirect(redirect);

        if !cfg.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|err| ProbeError::Failed(format!("failed to build HTTP client: {err}")))
    }

    fn build_request(
        &self,
        client: &reqwest::Client,
        target: &str,
        cfg: &HttpCheckConfig,
    ) -> Result<reqwest::RequestBuilder, ProbeError> {
        // Ensure the URL has a scheme
        let url = if target.contains("://") {
            target.to_string()
        } else {
            format!("https://{target}")
        };

        let method = reqwest::Method::from_bytes(cfg.method.as_bytes())
            .map_err(|_| ProbeError::Config(format!("invalid HTTP method: {}", cfg.method)))?;

        let mut request = client.request(method, &url);
        for (key, value) in &cfg.headers {
            request = request.header(key, value);
        }

        let has_user_agent = cfg
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("user-agent"));
        if !has_user_agent {
            request = request.header(USER_AGENT, DEFAULT_USER_AGENT);
        }

        if !cfg.body.is_empty() {
            request = request.body(cfg.body.clone());
        }

        Ok(request)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn kind(&self) -> CheckKind {
        CheckKind::Http
    }

    async fn run(&self, check: &Check) -> Result<CheckHistory, ProbeError> {
        let cfg = self.parse_config(&check.config)?;
        let client = self.build_client(&cfg)?;
        let request = self.build_request(&client, &check.target, &cfg)?;

        trace!(target = %check.target, method = %cfg.method, "sending HTTP request");
        let started = Instant::now();

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                // A failed request is still an observation; classify it
                let elapsed = started.elapsed().as_millis() as i64;
                let text = error_chain_text(&err);
                let status = if err.is_timeout() {
                    CheckStatus::Timeout
                } else {
                    classify_failure(&text)
                };
                return Ok(CheckHistory::new(check.id, status)
                    .with_response_time(elapsed)
                    .with_message(clamp_message(&format!("request failed: {text}"))));
            }
        };

        let elapsed = started.elapsed().as_millis() as i64;
        let status_code = response.status().as_u16();

        if status_code != cfg.expected_status {
            return Ok(CheckHistory::new(check.id, CheckStatus::Down)
                .with_response_time(elapsed)
                .with_status_code(status_code)
                .with_message(format!(
                    "unexpected status code: got {status_code}, expected {}",
                    cfg.expected_status
                )));
        }

        if !cfg.expected_content.is_empty() {
            let body = match response.bytes().await {
                Ok(bytes) => bytes,
                Err(err) => {
                    let text = error_chain_text(&err);
                    return Ok(CheckHistory::new(check.id, classify_failure(&text))
                        .with_response_time(elapsed)
                        .with_status_code(status_code)
                        .with_message(clamp_message(&format!(
                            "failed to read response body: {text}"
                        ))));
                }
            };
            let prefix = &body[..body.len().min(CONTENT_CHECK_BYTES)];
            let text = String::from_utf8_lossy(prefix);
            if !text.contains(&cfg.expected_content) {
                return Ok(CheckHistory::new(check.id, CheckStatus::Down)
                    .with_response_time(elapsed)
                    .with_status_code(status_code)
                    .with_message(format!(
                        "expected content not found: {}",
                        cfg.expected_content
                    )));
            }
        }

        Ok(CheckHistory::new(check.id, CheckStatus::Up)
            .with_response_time(elapsed)
            .with_status_code(status_code))
    }
}

/// Flatten an error with its source chain into one message so the
/// substring classifier sees the underlying I/O failure, not just the
/// top-level wrapper.
fn error_chain_text(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Keep persisted error messages within the 1000-char limit.
fn clamp_message(message: &str) -> String {
    if message.len() <= 1000 {
        return message.to_string();
    }
    let mut end = 1000;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
