//! Connectivity event bus
//!
//! A thin subscription layer over `tokio::sync::broadcast`. The orchestrator
//! publishes; any number of listeners subscribe. Publishing never blocks and
//! never fails: with no subscribers an event is simply dropped.
//!
//! ## Channels
//!
//! | Event | When |
//! |-------|------|
//! | `StatusChanged` | The cached connectivity flag flipped |
//! | `ConnectionSucceeded` | A check or attempt reported success |
//! | `ConnectionFailed` | A check or attempt reported failure while disconnected |
//! | `NetworkError` | An unexpected error ended a tracking session |

use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

pub use tokio::sync::broadcast::Receiver;

/// Events published by the connectivity service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The cached connectivity flag changed
    StatusChanged {
        /// New value of the flag
        connected: bool,
    },

    /// A check or attempt succeeded
    ConnectionSucceeded,

    /// A check or attempt failed
    ConnectionFailed,

    /// An unexpected error terminated a tracking session
    NetworkError {
        /// Error description
        error: String,
    },
}

impl ConnectivityEvent {
    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            ConnectivityEvent::StatusChanged { .. } => "status_changed",
            ConnectivityEvent::ConnectionSucceeded => "connection_succeeded",
            ConnectivityEvent::ConnectionFailed => "connection_failed",
            ConnectivityEvent::NetworkError { .. } => "network_error",
        }
    }
}

/// Broadcast bus for [`ConnectivityEvent`]s
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ConnectivityEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    ///
    /// A subscriber that falls further behind misses the oldest events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all current subscribers
    ///
    /// # Returns
    ///
    /// The number of subscribers the event was delivered to
    pub fn emit(&self, event: ConnectivityEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(event = event.label(), "no subscribers, event dropped");
                0
            }
        }
    }

    /// Create a receiver for all future events
    pub fn subscribe(&self) -> Receiver<ConnectivityEvent> {
        self.sender.subscribe()
    }

    /// Create a stream of all future events
    ///
    /// Lag notices are logged and skipped, so the stream only yields events.
    pub fn stream(&self) -> impl Stream<Item = ConnectivityEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("event stream lagged: {}", e);
                None
            }
        })
    }

    /// Invoke `callback` for every future event on a background task
    ///
    /// The callback runs until the returned [`Subscription`] is dropped or
    /// unsubscribed, or until every bus handle is gone.
    pub fn listen<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(ConnectivityEvent) + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => callback(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription { handle }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Handle of a callback registered with [`EventBus::listen`]
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering events to the callback
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether the listener task is still running
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
