//! Connectivity orchestrator
//!
//! The ConnectivityService is responsible for:
//! - Running the probes selected by a [`ValidationType`]
//! - Combining their verdicts into one outcome
//! - Updating the cached [`ConnectionState`]
//! - Owning the cancellation lifecycle of attempts and tracking sessions
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────┐
//!   caller ────────▶ │ ConnectivityService │
//!                    └─────────────────────┘
//!                               │
//!            ┌──────────────────┼──────────────────┐
//!            │ (gate)           │ (concurrent)     │ (concurrent)
//!            ▼                  ▼                  ▼
//!     ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!     │    Link     │    │    HTTP     │    │    Ping     │
//!     └─────────────┘    └─────────────┘    └─────────────┘
//!                               │
//!                               ▼ (AND)
//!                    ┌─────────────────────┐       ┌──────────┐
//!                    │   ConnectionState   │ ────▶ │ EventBus │
//!                    └─────────────────────┘       └──────────┘
//! ```
//!
//! ## Control Flows
//!
//! 1. [`check_connection`](ConnectivityService::check_connection): one pass
//! 2. [`try_connect`](ConnectivityService::try_connect): passes with backoff
//!    until success or the duration elapses
//! 3. [`start_tracking`](ConnectivityService::start_tracking): passes forever,
//!    republishing state until stopped

mod session;
mod tracking;

pub use session::TrackingHandle;

use crate::config::ValidatorConfig;
use crate::error::{Error, Result};
use crate::events::{ConnectivityEvent, EventBus, Receiver};
use crate::registry::ValidatorRegistry;
use crate::retry::{Backoff, sleep_or_cancel};
use crate::state::ConnectionState;
use crate::validation::{ProbeKind, ValidationType};
use chrono::{DateTime, Utc};
use session::SessionSlot;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a check or connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Every selected probe passed
    Connected,
    /// A selected probe failed, or the attempt ran out of time
    Disconnected,
    /// The operation's cancellation context fired
    Cancelled,
}

impl ConnectionOutcome {
    /// Whether connectivity was confirmed
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionOutcome::Connected)
    }

    /// Whether the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConnectionOutcome::Cancelled)
    }
}

impl From<bool> for ConnectionOutcome {
    fn from(connected: bool) -> Self {
        if connected {
            ConnectionOutcome::Connected
        } else {
            ConnectionOutcome::Disconnected
        }
    }
}

/// A spawned network probe, aborted when dropped
struct ProbeTask {
    kind: ProbeKind,
    handle: JoinHandle<bool>,
}

impl Drop for ProbeTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// State shared between the service handles and the tracking task
struct Inner {
    config: Arc<ValidatorConfig>,
    registry: ValidatorRegistry,
    state: ConnectionState,
    events: EventBus,
    session: Mutex<SessionSlot>,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, SessionSlot> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the selected probes once, without touching the connection state
    ///
    /// Link is a gate: when it fails, the network probes are never started.
    /// HTTP and ping run as separate tasks and must both pass when selected.
    async fn evaluate(
        &self,
        validation: ValidationType,
        cancel: &CancellationToken,
    ) -> Result<ConnectionOutcome> {
        if cancel.is_cancelled() {
            return Ok(ConnectionOutcome::Cancelled);
        }

        if validation.contains(ProbeKind::Link) {
            let link = self.registry.get(ProbeKind::Link)?;
            if !link.validate_access(cancel).await {
                if cancel.is_cancelled() {
                    return Ok(ConnectionOutcome::Cancelled);
                }
                if self.config.verbose_logging {
                    debug!("link check failed, network probes skipped");
                }
                return Ok(ConnectionOutcome::Disconnected);
            }
        }

        let validators = [ProbeKind::Http, ProbeKind::Ping]
            .into_iter()
            .filter(|kind| validation.contains(*kind))
            .map(|kind| self.registry.get(kind))
            .collect::<Result<Vec<_>>>()?;

        if validators.is_empty() {
            return Ok(ConnectionOutcome::Connected);
        }

        // Dropping the guards (early return, or the caller dropping this
        // future) aborts whatever probes are still running
        let mut probes = validators
            .into_iter()
            .map(|validator| {
                let cancel = cancel.clone();
                ProbeTask {
                    kind: validator.kind(),
                    handle: tokio::spawn(async move { validator.validate_access(&cancel).await }),
                }
            })
            .collect::<Vec<_>>();

        let mut all_passed = true;
        for probe in probes.iter_mut() {
            match (&mut probe.handle).await {
                Ok(passed) => {
                    if self.config.verbose_logging {
                        debug!(probe = %probe.kind, passed, "probe finished");
                    }
                    all_passed &= passed;
                }
                Err(e) => return Err(Error::probe(probe.kind, e.to_string())),
            }
        }

        if cancel.is_cancelled() {
            return Ok(ConnectionOutcome::Cancelled);
        }

        Ok(ConnectionOutcome::from(all_passed))
    }

    /// Bounded-duration attempt on an already reset token
    async fn attempt(
        &self,
        duration: Duration,
        validation: ValidationType,
        cancel: CancellationToken,
    ) -> Result<ConnectionOutcome> {
        let start = Instant::now();
        let mut backoff = Backoff::from_config(&self.config);

        while start.elapsed() < duration && !cancel.is_cancelled() {
            let outcome = match self.evaluate(validation, &cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.state.update(false, false);
                    return Err(e);
                }
            };

            match outcome {
                ConnectionOutcome::Connected => {
                    self.state.update(true, true);
                    info!(
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "connection established"
                    );
                    return Ok(ConnectionOutcome::Connected);
                }
                ConnectionOutcome::Cancelled => break,
                ConnectionOutcome::Disconnected => {}
            }

            if self.config.verbose_logging {
                debug!(delay_ms = backoff.current_ms(), "connect attempt failed, backing off");
            }
            if !sleep_or_cancel(backoff.current(), &cancel).await {
                break;
            }
            backoff.grow();
        }

        self.state.update(false, false);

        if cancel.is_cancelled() {
            info!("connect attempt cancelled");
            return Ok(ConnectionOutcome::Cancelled);
        }

        warn!(
            duration_ms = duration.as_millis() as u64,
            "connect attempt timed out"
        );
        Ok(ConnectionOutcome::Disconnected)
    }
}

/// Connectivity validation service
///
/// Owns the cached connectivity flag, the validators and the shared
/// cancellation slot. Construct one per application and hand out clones;
/// every clone drives the same state.
///
/// ## Lifecycle
///
/// 1. Register validators in a [`ValidatorRegistry`]
/// 2. Create with [`ConnectivityService::new()`]
/// 3. Check, connect, or track
/// 4. Call [`ConnectivityService::shutdown()`] before exit
///
/// ## Threading
///
/// Operations are async and never block the calling thread on network I/O.
/// [`start_tracking`](Self::start_tracking) and the callback variants spawn
/// onto the current tokio runtime.
#[derive(Clone)]
pub struct ConnectivityService {
    inner: Arc<Inner>,
}

impl ConnectivityService {
    /// Create a new connectivity service
    ///
    /// # Parameters
    ///
    /// - `config`: Probe and retry configuration (validated here)
    /// - `registry`: Validators for the probe kinds callers will select
    ///
    /// # Returns
    ///
    /// - `Ok(ConnectivityService)`: Service in the disconnected state
    /// - `Err(Error::Config)`: If the configuration is invalid
    pub fn new(
        config: impl Into<Arc<ValidatorConfig>>,
        registry: ValidatorRegistry,
    ) -> Result<Self> {
        let config = config.into();
        config.validate()?;

        let events = EventBus::new(config.event_channel_capacity);
        let state = ConnectionState::new(events.clone(), config.verbose_logging);

        if registry.kinds().is_empty() {
            warn!("connectivity service created without validators");
        }

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry,
                state,
                events,
                session: Mutex::new(SessionSlot::new()),
            }),
        })
    }

    /// Configuration snapshot in use
    pub fn config(&self) -> &ValidatorConfig {
        &self.inner.config
    }

    /// Cached connectivity flag (non-blocking)
    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    /// When the cached flag last flipped
    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        self.inner.state.last_transition()
    }

    /// Event bus carrying this service's notifications
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribe to this service's notifications
    pub fn subscribe(&self) -> Receiver<ConnectivityEvent> {
        self.inner.events.subscribe()
    }

    /// Check connectivity once
    ///
    /// Runs on the shared cancellation context, so stopping tracking or
    /// starting a connect attempt cancels an in-flight check.
    ///
    /// The connection state is updated with the result: `(true, true)` when
    /// connected, `(false, false)` otherwise (including cancellation).
    ///
    /// # Returns
    ///
    /// - `Ok(ConnectionOutcome)`: Connected, Disconnected or Cancelled
    /// - `Err(Error)`: A selected probe kind is not registered, or a probe task failed
    pub async fn check_connection(&self, validation: ValidationType) -> Result<ConnectionOutcome> {
        let cancel = self.inner.session().current_token();
        let result = self.inner.evaluate(validation, &cancel).await;

        match &result {
            Ok(ConnectionOutcome::Connected) => {
                self.inner.state.update(true, true);
            }
            Ok(_) | Err(_) => {
                self.inner.state.update(false, false);
            }
        }

        if self.inner.config.verbose_logging {
            debug!(%validation, result = ?result, "connection check finished");
        }

        result
    }

    /// Check connectivity once and report through callbacks
    ///
    /// `on_succeeded` runs when connected; `on_failed` runs when disconnected
    /// or cancelled. Neither runs when the check returns an error.
    pub fn check_connection_with<S, F>(
        &self,
        validation: ValidationType,
        on_succeeded: S,
        on_failed: F,
    ) -> JoinHandle<Result<ConnectionOutcome>>
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let service = self.clone();
        tokio::spawn(async move {
            let outcome = service.check_connection(validation).await?;
            if outcome.is_connected() {
                on_succeeded();
            } else {
                on_failed();
            }
            Ok(outcome)
        })
    }

    /// Keep checking until connected or `duration` elapses
    ///
    /// Resets the shared cancellation context first, cancelling any earlier
    /// attempt or tracking session. Between failed checks the service sleeps
    /// with exponential backoff. Intermediate failures do not touch the
    /// connection state; only the final result does.
    ///
    /// # Returns
    ///
    /// - `Ok(Connected)`: A check succeeded; state set to `(true, true)`
    /// - `Ok(Disconnected)`: The duration elapsed; state set to `(false, false)`
    /// - `Ok(Cancelled)`: The context was cancelled; state set to `(false, false)`
    /// - `Err(Error)`: A selected probe kind is not registered, or a probe task failed
    pub async fn try_connect(
        &self,
        duration: Duration,
        validation: ValidationType,
    ) -> Result<ConnectionOutcome> {
        let cancel = self.inner.session().reset();
        self.inner.attempt(duration, validation, cancel).await
    }

    /// Keep checking until connected or `duration` elapses, reporting through callbacks
    ///
    /// The shared context is reset before this returns. Once the outcome is
    /// known, a `ConnectionSucceeded` or `ConnectionFailed` event is published
    /// and the matching callback runs. A cancelled attempt runs neither.
    pub fn try_connect_with<S, F>(
        &self,
        duration: Duration,
        validation: ValidationType,
        on_succeeded: S,
        on_failed: F,
    ) -> JoinHandle<Result<ConnectionOutcome>>
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let cancel = self.inner.session().reset();
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let outcome = inner.attempt(duration, validation, cancel).await?;
            match outcome {
                ConnectionOutcome::Connected => {
                    if inner.config.verbose_logging {
                        debug!("connection successful (callback)");
                    }
                    inner.events.emit(ConnectivityEvent::ConnectionSucceeded);
                    on_succeeded();
                }
                ConnectionOutcome::Disconnected => {
                    if inner.config.verbose_logging {
                        debug!("connection attempts failed within duration (callback)");
                    }
                    inner.events.emit(ConnectivityEvent::ConnectionFailed);
                    on_failed();
                }
                ConnectionOutcome::Cancelled => {}
            }
            Ok(outcome)
        })
    }

    /// Stop tracking and cancel whatever uses the shared context
    pub fn shutdown(&self) {
        self.inner.session().stop();
        info!("connectivity service shut down");
    }
}

impl std::fmt::Debug for ConnectivityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityService")
            .field("connected", &self.is_connected())
            .field("tracking", &self.is_tracking())
            .field("registry", &self.inner.registry)
            .finish()
    }
}
