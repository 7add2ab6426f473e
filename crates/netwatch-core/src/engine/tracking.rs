//! Continuous connectivity tracking
//!
//! At most one tracking session runs per service. Each iteration performs one
//! check, pushes the raw result into the connection state, and sleeps with
//! backoff: the delay returns to the base value after a success and grows
//! after a failure.
//!
//! State writes happen under the session lock (session, then state), so a
//! session superseded by `try_connect` or a restart never overwrites the
//! result of the operation that replaced it.

use super::{ConnectivityService, Inner, TrackingHandle};
use crate::error::Result;
use crate::events::ConnectivityEvent;
use crate::retry::{Backoff, sleep_or_cancel};
use crate::validation::ValidationType;
use std::sync::Arc;
use tracing::{debug, error, info};

impl ConnectivityService {
    /// Start tracking connectivity in the background
    ///
    /// Idempotent: while a session is running, the existing handle is
    /// returned and no second loop is started. Otherwise the shared
    /// cancellation context is reset and a new session is spawned on the
    /// current tokio runtime.
    ///
    /// # Returns
    ///
    /// The handle of the running session
    pub fn start_tracking(&self, validation: ValidationType) -> TrackingHandle {
        let mut session = self.inner.session();

        if let Some(handle) = session.active_tracking() {
            debug!(session = handle.id(), "tracking already active");
            return handle.clone();
        }

        let handle = session.begin_tracking();
        tokio::spawn(track(Arc::clone(&self.inner), handle.clone(), validation));

        info!(session = handle.id(), %validation, "connection tracking started");
        handle
    }

    /// Stop tracking
    ///
    /// Cancels the shared context, which also cancels an in-flight check or
    /// connect attempt. Safe to call when no session is running.
    pub fn stop_tracking(&self) {
        let mut session = self.inner.session();
        if let Some(handle) = session.active_tracking() {
            info!(session = handle.id(), "connection tracking stopped");
        }
        session.stop();
    }

    /// Whether a tracking session is running
    pub fn is_tracking(&self) -> bool {
        self.inner.session().active_tracking().is_some()
    }
}

/// Body of a tracking session
///
/// Cancellation ends the session quietly. Any other error is published as a
/// `NetworkError` event and ends only this session.
async fn track(inner: Arc<Inner>, handle: TrackingHandle, validation: ValidationType) {
    let result = run_loop(&inner, &handle, validation).await;

    if let Err(e) = result {
        error!(session = handle.id(), error = %e, "connection tracking failed");
        inner.events.emit(ConnectivityEvent::NetworkError {
            error: e.to_string(),
        });
    }

    // A superseded session leaves the state to whoever replaced it
    let mut session = inner.session();
    if session.owns_slot(handle.id()) {
        inner.state.update(false, false);
    }
    session.end_tracking(handle.id());
    drop(session);

    debug!(session = handle.id(), "tracking session ended");
}

async fn run_loop(inner: &Inner, handle: &TrackingHandle, validation: ValidationType) -> Result<()> {
    let cancel = handle.token();
    let mut backoff = Backoff::from_config(&inner.config);

    while inner.session().is_tracking(handle.id()) && !cancel.is_cancelled() {
        let outcome = inner.evaluate(validation, cancel).await?;
        if outcome.is_cancelled() {
            break;
        }

        let connected = outcome.is_connected();
        {
            let session = inner.session();
            if !session.is_tracking(handle.id()) {
                break;
            }
            inner.state.update(connected, connected);
        }

        if connected {
            backoff.reset();
        } else {
            backoff.grow();
        }

        if inner.config.verbose_logging {
            debug!(
                session = handle.id(),
                connected,
                next_check_ms = backoff.current_ms(),
                "tracking iteration"
            );
        }

        if !sleep_or_cancel(backoff.current(), cancel).await {
            break;
        }
    }

    Ok(())
}
