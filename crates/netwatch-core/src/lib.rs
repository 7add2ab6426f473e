// # netwatch-core
//
// Core library for the netwatch connectivity validation engine.
//
// ## Architecture Overview
//
// This library decides whether the host has usable network connectivity:
// - **AccessValidator**: Trait for a single probe (link, HTTP, ping)
// - **ValidatorRegistry**: Plugin-based registry of probes keyed by kind
// - **ValidationType**: Which probes participate in a given check
// - **ConnectionState**: The single cached connectivity flag
// - **EventBus**: Broadcast of connectivity events to any number of listeners
// - **ConnectivityService**: Orchestrates one-shot checks, bounded connect
//   attempts and continuous tracking
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Probes are separate crates, the core only composes them
// 2. **Cooperative Cancellation**: Every suspendable call takes a cancellation token
// 3. **Exactly-Once Transitions**: State changes are published once per flip
// 4. **Library-First**: The daemon is a thin layer over this crate
// 5. **Fail-Fast Configuration**: Invalid configuration is rejected at construction

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;
pub mod events;
pub mod retry;
pub mod state;
pub mod validation;

// Re-export core types for convenience
pub use traits::AccessValidator;
pub use engine::{ConnectionOutcome, ConnectivityService, TrackingHandle};
pub use registry::ValidatorRegistry;
pub use config::ValidatorConfig;
pub use error::{Error, Result};
pub use events::{ConnectivityEvent, EventBus, Subscription};
pub use retry::{Backoff, retry_with_backoff};
pub use state::ConnectionState;
pub use validation::{ProbeKind, ValidationType};

pub use tokio_util::sync::CancellationToken;
