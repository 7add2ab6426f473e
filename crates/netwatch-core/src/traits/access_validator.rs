// # Access Validator Trait
//
// Defines the interface for a single connectivity probe.
//
// ## Implementations
//
// - Link reachability: `netwatch-link` crate
// - HTTP reachability: `netwatch-probe-http` crate
// - ICMP reachability: `netwatch-probe-ping` crate
//
// ## Usage
//
// ```rust,ignore
// use netwatch_core::{AccessValidator, CancellationToken};
//
// #[tokio::main]
// async fn main() {
//     let validator = /* AccessValidator implementation */;
//     let cancel = CancellationToken::new();
//
//     if validator.validate_access(&cancel).await {
//         println!("{} probe passed", validator.kind());
//     }
// }
// ```

use crate::validation::ProbeKind;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Trait for connectivity probe implementations
///
/// A validator answers one question: can this aspect of connectivity be
/// confirmed right now? The answer is a plain `bool`.
///
/// Implementations must be thread-safe and usable across async tasks. The
/// orchestrator runs the HTTP and ping validators concurrently and reuses the
/// same instance for every check, so validators hold no mutable state beyond
/// their read-only configuration.
///
/// # Failure Model
///
/// - A single unreachable target, a malformed response or a timeout is
///   converted to `false` for that target and never escapes.
/// - Cancellation is observed cooperatively: once `cancel` fires, the
///   validator abandons in-flight work and returns `false` promptly. The
///   orchestrator tells a cancelled run apart from a failed one by checking
///   the token, not the return value.
///
/// # Retry
///
/// Network validators may wrap their pass over targets in
/// [`retry_with_backoff`](crate::retry::retry_with_backoff). The link
/// validator never retries.
#[async_trait]
pub trait AccessValidator: Send + Sync {
    /// Probe connectivity
    ///
    /// # Parameters
    ///
    /// - `cancel`: Cancellation context of the calling operation
    ///
    /// # Returns
    ///
    /// `true` if the probe confirmed connectivity
    async fn validate_access(&self, cancel: &CancellationToken) -> bool;

    /// Which probe kind this validator implements
    fn kind(&self) -> ProbeKind;
}
