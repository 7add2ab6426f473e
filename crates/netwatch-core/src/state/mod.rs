//! Cached connectivity state
//!
//! [`ConnectionState`] owns the single connectivity flag. Every update goes
//! through [`ConnectionState::update`], which compares and stores under one
//! mutex so that each flip publishes exactly one `StatusChanged` event.

use crate::events::{ConnectivityEvent, EventBus};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct StatusCell {
    connected: bool,
    last_transition: Option<DateTime<Utc>>,
}

/// The cached connectivity flag and its change notifications
#[derive(Debug)]
pub struct ConnectionState {
    cell: Mutex<StatusCell>,
    events: EventBus,
    verbose: bool,
}

impl ConnectionState {
    /// Create a disconnected state publishing to `events`
    pub fn new(events: EventBus, verbose: bool) -> Self {
        Self {
            cell: Mutex::new(StatusCell::default()),
            events,
            verbose,
        }
    }

    /// Current value of the flag
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// When the flag last flipped, if it ever did
    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        self.lock().last_transition
    }

    /// Store a new connectivity value and publish the matching events
    ///
    /// - `StatusChanged` fires iff `new_status` differs from the stored value.
    ///   It is published while the lock is held, so concurrent updates cannot
    ///   reorder transitions.
    /// - `ConnectionSucceeded` fires whenever `is_success` is set.
    /// - `ConnectionFailed` fires whenever `is_success` is unset and
    ///   `new_status` is `false`, even without a flip.
    ///
    /// # Returns
    ///
    /// `true` if the stored value changed
    pub fn update(&self, new_status: bool, is_success: bool) -> bool {
        let changed = {
            let mut cell = self.lock();
            if cell.connected == new_status {
                false
            } else {
                cell.connected = new_status;
                cell.last_transition = Some(Utc::now());
                self.events.emit(ConnectivityEvent::StatusChanged {
                    connected: new_status,
                });
                true
            }
        };

        if changed && self.verbose {
            debug!(connected = new_status, "connection status changed");
        }

        if is_success {
            self.events.emit(ConnectivityEvent::ConnectionSucceeded);
            if self.verbose {
                debug!("connection successful");
            }
        } else if !new_status {
            self.events.emit(ConnectivityEvent::ConnectionFailed);
            if self.verbose {
                debug!("connection failed");
            }
        }

        changed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
