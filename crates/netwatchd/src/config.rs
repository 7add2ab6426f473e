//! Daemon configuration from environment variables
//!
//! An optional JSON file (`NETWATCH_CONFIG`) provides the base validator
//! configuration; individual `NETWATCH_*` variables override its fields.

use anyhow::{Context, Result};
use netwatch_core::{ValidationType, ValidatorConfig};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Longest accepted bounded-attempt duration
const MAX_CONNECT_DURATION_SECS: f64 = 3600.0;

/// What the daemon does once started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One check, then exit
    Check,
    /// Keep checking until connected or the duration elapses, then exit
    Connect,
    /// Track until SIGINT/SIGTERM
    Track,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(Mode::Check),
            "connect" => Ok(Mode::Connect),
            "track" => Ok(Mode::Track),
            other => anyhow::bail!(
                "unknown mode '{}', supported modes: check, connect, track",
                other
            ),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Check => "check",
            Mode::Connect => "connect",
            Mode::Track => "track",
        };
        f.write_str(name)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub validator: ValidatorConfig,
    pub validation: ValidationType,
    pub mode: Mode,
    pub connect_duration_secs: f64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut validator = match lookup("NETWATCH_CONFIG") {
            Some(path) => ValidatorConfig::load(&path)
                .with_context(|| format!("Failed to load NETWATCH_CONFIG file {}", path))?,
            None => ValidatorConfig::default(),
        };

        if let Some(urls) = lookup("NETWATCH_HTTP_URLS") {
            validator.http_urls = split_list(&urls);
        }
        if let Some(hosts) = lookup("NETWATCH_PING_HOSTS") {
            validator.ping_hosts = split_list(&hosts);
        }
        if let Some(value) = parse_var(&lookup, "NETWATCH_HTTP_TIMEOUT_SECS")? {
            validator.http_timeout_secs = value;
        }
        if let Some(value) = parse_var(&lookup, "NETWATCH_HTTP_RETRY_BUDGET_SECS")? {
            validator.http_retry_budget_secs = Some(value);
        }
        if let Some(value) = parse_var(&lookup, "NETWATCH_PING_TIMEOUT_MS")? {
            validator.ping_timeout_ms = value;
        }
        if let Some(value) = parse_var(&lookup, "NETWATCH_PING_RETRY_BUDGET_MS")? {
            validator.ping_retry_budget_ms = Some(value);
        }
        if let Some(value) = parse_var(&lookup, "NETWATCH_BASE_RETRY_INTERVAL_MS")? {
            validator.base_retry_interval_ms = value;
        }
        if let Some(value) = parse_var(&lookup, "NETWATCH_MAX_RETRY_INTERVAL_MS")? {
            validator.max_retry_interval_ms = value;
        }
        if let Some(value) = parse_var(&lookup, "NETWATCH_BACKOFF_MULTIPLIER")? {
            validator.backoff_multiplier = value;
        }
        if let Some(value) = lookup("NETWATCH_VERBOSE") {
            validator.verbose_logging = parse_flag(&value)?;
        }

        let validation = match lookup("NETWATCH_VALIDATION") {
            Some(value) => value
                .parse()
                .with_context(|| format!("NETWATCH_VALIDATION '{}' is not valid", value))?,
            None => ValidationType::DEFAULT,
        };

        Ok(Self {
            validator,
            validation,
            mode: parse_var(&lookup, "NETWATCH_MODE")?.unwrap_or(Mode::Track),
            connect_duration_secs: parse_var(&lookup, "NETWATCH_CONNECT_DURATION_SECS")?
                .unwrap_or(30.0),
            log_level: lookup("NETWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validator
            .validate()
            .context("Validator configuration is invalid")?;

        if self.validation.is_empty() {
            anyhow::bail!(
                "NETWATCH_VALIDATION selects no probes. \
                Use a preset (default, all, web, ping_check) or a list such as link,http"
            );
        }

        if !(self.connect_duration_secs > 0.0
            && self.connect_duration_secs <= MAX_CONNECT_DURATION_SECS)
        {
            anyhow::bail!(
                "NETWATCH_CONNECT_DURATION_SECS must be between 0 and {} seconds. Got: {}",
                MAX_CONNECT_DURATION_SECS,
                self.connect_duration_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "NETWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Duration of a bounded connect attempt
    pub fn connect_duration(&self) -> Duration {
        Duration::from_secs_f64(self.connect_duration_secs)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", key, value, e))
        })
        .transpose()
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("NETWATCH_VERBOSE '{}' is not a boolean", other),
    }
}
