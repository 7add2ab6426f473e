// # Ping Validator
//
// This crate provides the ICMP echo reachability probe for netwatch.
//
// ## Architecture
//
// ```text
// PingValidator ──▶ Pinger (trait) ──▶ SystemPinger (platform `ping` command)
// ```
//
// The validator owns the timing: each host gets `ping_timeout_ms` of
// wall-clock time, measured here rather than by the ping tool, and the
// multi-host pass is retried with backoff for `ping_retry_budget()`.
// A reply with any round-trip time counts as success.
//
// `SystemPinger` shells out because raw ICMP sockets need privileges the
// daemon usually does not have. Other transports plug in through [`Pinger`].

mod system;

pub use system::{SystemPinger, parse_rtt};

use netwatch_core::config::ValidatorConfig;
use netwatch_core::retry::retry_with_backoff;
use netwatch_core::traits::AccessValidator;
use netwatch_core::{CancellationToken, Error, ProbeKind, Result, ValidatorRegistry};

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// Echo primitive used by [`PingValidator`]
#[async_trait::async_trait]
pub trait Pinger: Send + Sync {
    /// Send one echo request to `host`
    ///
    /// # Returns
    ///
    /// - `Ok(Duration)`: Round-trip time of the reply
    /// - `Err(Error::Ping)`: No reply, or the primitive failed
    async fn ping(&self, host: &str) -> Result<Duration>;
}

/// Ping reachability validator
pub struct PingValidator<P = SystemPinger> {
    /// Hosts tried in order
    hosts: Vec<String>,

    config: Arc<ValidatorConfig>,

    pinger: P,
}

impl PingValidator<SystemPinger> {
    /// Create a validator pinging `config.ping_hosts` with the system `ping`
    pub fn new(config: Arc<ValidatorConfig>) -> Self {
        Self::with_pinger(config, SystemPinger::new())
    }
}

impl<P: Pinger> PingValidator<P> {
    /// Create a validator over a custom echo primitive
    pub fn with_pinger(config: Arc<ValidatorConfig>, pinger: P) -> Self {
        Self {
            hosts: config.ping_hosts.clone(),
            config,
            pinger,
        }
    }

    /// Ping `hosts` instead of the configured list
    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = hosts;
        self
    }

    /// One pass over the hosts
    async fn sweep(&self, cancel: &CancellationToken) -> Result<bool> {
        let timeout = self.config.ping_timeout();

        for host in &self.hosts {
            let reply = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                reply = tokio::time::timeout(timeout, self.pinger.ping(host)) => reply,
            };

            match reply {
                Ok(Ok(rtt)) => {
                    if self.config.verbose_logging {
                        debug!(%host, rtt_ms = rtt.as_millis() as u64, "ping succeeded");
                    }
                    return Ok(true);
                }
                Ok(Err(e)) => {
                    if self.config.verbose_logging {
                        debug!(%host, error = %e, "ping failed");
                    }
                }
                Err(_) => {
                    if self.config.verbose_logging {
                        debug!(%host, timeout_ms = timeout.as_millis() as u64, "ping timed out");
                    }
                }
            }
        }
        Ok(false)
    }
}

#[async_trait::async_trait]
impl<P: Pinger> AccessValidator for PingValidator<P> {
    async fn validate_access(&self, cancel: &CancellationToken) -> bool {
        if self.hosts.is_empty() {
            return false;
        }

        retry_with_backoff(
            move |token| async move { self.sweep(&token).await },
            self.config.ping_retry_budget(),
            &self.config,
            cancel,
        )
        .await
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Ping
    }
}

/// Register the system ping validator with a registry
pub fn register(registry: &ValidatorRegistry, config: &Arc<ValidatorConfig>) {
    registry.register(Arc::new(PingValidator::new(Arc::clone(config))));
}
