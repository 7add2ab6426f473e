//! Shared cancellation slot
//!
//! One cancellation context governs the in-flight bounded attempt or tracking
//! session. Resetting the slot cancels the old context and installs a new one;
//! anything still holding the old token observes the cancellation.

use std::fmt;
use tokio_util::sync::CancellationToken;

/// Handle of a continuous tracking session
///
/// Two handles are equal when they refer to the same session.
#[derive(Clone)]
pub struct TrackingHandle {
    id: u64,
    token: CancellationToken,
}

impl TrackingHandle {
    /// Session identifier, unique per service
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request the session to stop
    ///
    /// The service observes the request at its next suspension point and
    /// forces the connection state to disconnected.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until cancellation is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Cancellation context of the session
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl PartialEq for TrackingHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TrackingHandle {}

impl fmt::Debug for TrackingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// The cancellation slot and the tracking flag, guarded together
#[derive(Debug)]
pub(crate) struct SessionSlot {
    token: CancellationToken,
    generation: u64,
    tracking: Option<TrackingHandle>,
}

impl SessionSlot {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            generation: 0,
            tracking: None,
        }
    }

    /// Token for a one-shot check; a cancelled slot is refreshed first
    pub(crate) fn current_token(&mut self) -> CancellationToken {
        if self.token.is_cancelled() {
            self.replace();
        }
        self.token.clone()
    }

    /// Cancel whatever uses the slot and install a fresh token
    pub(crate) fn reset(&mut self) -> CancellationToken {
        self.token.cancel();
        self.replace();
        self.token.clone()
    }

    /// The running tracking session, if any
    pub(crate) fn active_tracking(&self) -> Option<&TrackingHandle> {
        self.tracking.as_ref().filter(|handle| !handle.is_cancelled())
    }

    /// Whether `id` is still the running tracking session
    pub(crate) fn is_tracking(&self, id: u64) -> bool {
        self.active_tracking().is_some_and(|handle| handle.id == id)
    }

    /// Reset the slot and record a new tracking session on it
    pub(crate) fn begin_tracking(&mut self) -> TrackingHandle {
        let token = self.reset();
        let handle = TrackingHandle {
            id: self.generation,
            token,
        };
        self.tracking = Some(handle.clone());
        handle
    }

    /// Whether session `id` still owns the slot's token
    ///
    /// False once a reset or a refresh has installed a newer token, even
    /// if session `id` is still winding down.
    pub(crate) fn owns_slot(&self, id: u64) -> bool {
        self.generation == id
    }

    /// Clear the tracking record if it still belongs to session `id`
    pub(crate) fn end_tracking(&mut self, id: u64) {
        if self.tracking.as_ref().is_some_and(|handle| handle.id == id) {
            self.tracking = None;
        }
    }

    /// Clear the tracking record and cancel the slot
    pub(crate) fn stop(&mut self) {
        self.tracking = None;
        self.token.cancel();
    }

    fn replace(&mut self) {
        self.token = CancellationToken::new();
        self.generation += 1;
    }
}
