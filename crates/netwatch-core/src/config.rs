//! Configuration types for the netwatch system
//!
//! [`ValidatorConfig`] is the immutable snapshot handed to every probe and to
//! the orchestrator. It is loaded once, validated once, and never mutated by
//! the core.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Allowed range for `http_timeout_secs`
pub const HTTP_TIMEOUT_RANGE_SECS: (f64, f64) = (1.0, 10.0);
/// Allowed range for `ping_timeout_ms`
pub const PING_TIMEOUT_RANGE_MS: (u64, u64) = (500, 5000);
/// Allowed range for `base_retry_interval_ms`
pub const BASE_RETRY_RANGE_MS: (u64, u64) = (50, 1000);
/// Allowed range for `max_retry_interval_ms`
pub const MAX_RETRY_RANGE_MS: (u64, u64) = (1000, 10000);
/// Allowed range for `backoff_multiplier`
pub const BACKOFF_MULTIPLIER_RANGE: (f64, f64) = (1.1, 3.0);

/// Probe and retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// URLs probed by the HTTP validator, in order
    pub http_urls: Vec<String>,

    /// Per-request HTTP timeout (in seconds)
    pub http_timeout_secs: f64,

    /// Total retry budget of the HTTP validator (in seconds)
    ///
    /// `None` reuses `http_timeout_secs`, so the request timeout also caps
    /// how long the validator keeps retrying.
    pub http_retry_budget_secs: Option<f64>,

    /// Hosts probed by the ping validator, in order
    pub ping_hosts: Vec<String>,

    /// Per-host ping timeout (in milliseconds, wall clock)
    pub ping_timeout_ms: u64,

    /// Total retry budget of the ping validator (in milliseconds)
    ///
    /// `None` reuses `ping_timeout_ms`.
    pub ping_retry_budget_ms: Option<u64>,

    /// First delay of every backoff run (in milliseconds)
    pub base_retry_interval_ms: u64,

    /// Upper bound of the backoff delay (in milliseconds)
    pub max_retry_interval_ms: u64,

    /// Growth factor applied to the delay after each failed attempt
    pub backoff_multiplier: f64,

    /// Emit per-attempt and per-transition diagnostics
    pub verbose_logging: bool,

    /// Capacity of the event bus
    ///
    /// Subscribers that fall further behind than this miss events.
    pub event_channel_capacity: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            http_urls: vec!["https://www.google.com".to_string()],
            http_timeout_secs: 3.0,
            http_retry_budget_secs: None,
            ping_hosts: vec!["8.8.8.8".to_string()],
            ping_timeout_ms: 3000,
            ping_retry_budget_ms: None,
            base_retry_interval_ms: 100,
            max_retry_interval_ms: 5000,
            backoff_multiplier: 1.5,
            verbose_logging: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl ValidatorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON document
    ///
    /// Missing fields take their default value.
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Validate the configuration
    ///
    /// A violated `max_retry_interval_ms >= base_retry_interval_ms` invariant
    /// is rejected rather than clamped.
    pub fn validate(&self) -> Result<(), crate::Error> {
        check_range_f64(
            "http_timeout_secs",
            self.http_timeout_secs,
            HTTP_TIMEOUT_RANGE_SECS,
        )?;
        check_range_u64("ping_timeout_ms", self.ping_timeout_ms, PING_TIMEOUT_RANGE_MS)?;
        check_range_u64(
            "base_retry_interval_ms",
            self.base_retry_interval_ms,
            BASE_RETRY_RANGE_MS,
        )?;
        check_range_u64(
            "max_retry_interval_ms",
            self.max_retry_interval_ms,
            MAX_RETRY_RANGE_MS,
        )?;
        check_range_f64(
            "backoff_multiplier",
            self.backoff_multiplier,
            BACKOFF_MULTIPLIER_RANGE,
        )?;

        if self.max_retry_interval_ms < self.base_retry_interval_ms {
            return Err(crate::Error::config(format!(
                "max_retry_interval_ms ({}) must be >= base_retry_interval_ms ({})",
                self.max_retry_interval_ms, self.base_retry_interval_ms
            )));
        }

        if let Some(budget) = self.http_retry_budget_secs
            && !(budget.is_finite() && budget >= 0.0)
        {
            return Err(crate::Error::config(format!(
                "http_retry_budget_secs must be a non-negative number. Got: {}",
                budget
            )));
        }

        if self.http_urls.iter().any(|url| url.trim().is_empty()) {
            return Err(crate::Error::config("http_urls cannot contain empty entries"));
        }

        if self.ping_hosts.iter().any(|host| host.trim().is_empty()) {
            return Err(crate::Error::config("ping_hosts cannot contain empty entries"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }

        Ok(())
    }

    /// Per-request HTTP timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.http_timeout_secs)
    }

    /// Retry budget of the HTTP validator
    pub fn http_retry_budget(&self) -> Duration {
        Duration::from_secs_f64(self.http_retry_budget_secs.unwrap_or(self.http_timeout_secs))
    }

    /// Per-host ping timeout
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    /// Retry budget of the ping validator
    pub fn ping_retry_budget(&self) -> Duration {
        Duration::from_millis(self.ping_retry_budget_ms.unwrap_or(self.ping_timeout_ms))
    }

    /// First backoff delay
    pub fn base_retry_interval(&self) -> Duration {
        Duration::from_millis(self.base_retry_interval_ms)
    }

    /// Backoff delay ceiling
    pub fn max_retry_interval(&self) -> Duration {
        Duration::from_millis(self.max_retry_interval_ms)
    }
}

fn check_range_f64(name: &str, value: f64, (min, max): (f64, f64)) -> Result<(), crate::Error> {
    if !(min..=max).contains(&value) {
        return Err(crate::Error::config(format!(
            "{} must be between {} and {}. Got: {}",
            name, min, max, value
        )));
    }
    Ok(())
}

fn check_range_u64(name: &str, value: u64, (min, max): (u64, u64)) -> Result<(), crate::Error> {
    if !(min..=max).contains(&value) {
        return Err(crate::Error::config(format!(
            "{} must be between {} and {}. Got: {}",
            name, min, max, value
        )));
    }
    Ok(())
}

fn default_event_channel_capacity() -> usize {
    64
}
