//! Exponential backoff and bounded-duration retry
//!
//! The delay sequence for base `b`, ceiling `M` and multiplier `m` is
//! `d0 = b`, `d(n+1) = min(round(d(n) * m), M)`. It is non-decreasing and
//! reaches `M` in a finite number of steps for any `m > 1`.
//!
//! Elapsed time is measured with [`tokio::time::Instant`], so tests can drive
//! retries with a paused clock.

use crate::config::ValidatorConfig;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Backoff delay state for a single retry run
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    multiplier: f64,
    current_ms: u64,
}

impl Backoff {
    /// Create a backoff starting at `base_ms`
    pub fn new(base_ms: u64, max_ms: u64, multiplier: f64) -> Self {
        Self {
            base_ms,
            max_ms,
            multiplier,
            current_ms: base_ms,
        }
    }

    /// Create a backoff from the retry settings of `config`
    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(
            config.base_retry_interval_ms,
            config.max_retry_interval_ms,
            config.backoff_multiplier,
        )
    }

    /// Delay to wait before the next attempt
    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Current delay in milliseconds
    pub fn current_ms(&self) -> u64 {
        self.current_ms
    }

    /// Grow the delay after a failed attempt and return the new value
    pub fn grow(&mut self) -> Duration {
        let grown = (self.current_ms as f64 * self.multiplier).round() as u64;
        self.current_ms = grown.min(self.max_ms);
        self.current()
    }

    /// Return to the base delay
    pub fn reset(&mut self) {
        self.current_ms = self.base_ms;
    }
}

/// Sleep for `duration` unless `cancel` fires first
///
/// # Returns
///
/// `true` if the full duration elapsed, `false` if cancelled
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Retry `operation` with exponential backoff for at most `budget`
///
/// The operation is repeated until it yields a value different from
/// `T::default()`, the elapsed time reaches `budget`, or `cancel` fires.
/// At least one attempt is always made, so a zero budget means exactly one.
///
/// Errors returned by the operation count as failed attempts; they are
/// logged when `config.verbose_logging` is set and otherwise swallowed.
/// An [`Error::Cancelled`](crate::Error::Cancelled) ends the loop.
///
/// # Returns
///
/// The first non-default value, or `T::default()` when the loop gives up.
/// Exhausting the budget or being cancelled is not an error.
pub async fn retry_with_backoff<T, F, Fut>(
    mut operation: F,
    budget: Duration,
    config: &ValidatorConfig,
    cancel: &CancellationToken,
) -> T
where
    T: Default + PartialEq,
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut backoff = Backoff::from_config(config);
    let mut attempt = 0u32;

    while !cancel.is_cancelled() {
        attempt += 1;

        match operation(cancel.clone()).await {
            Ok(value) if value != T::default() => return value,
            Ok(_) => {
                trace!(attempt, "retry attempt produced no result");
            }
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                if config.verbose_logging {
                    debug!(attempt, error = %e, "retry attempt failed");
                }
            }
        }

        if start.elapsed() >= budget {
            break;
        }

        if !sleep_or_cancel(backoff.current(), cancel).await {
            break;
        }
        backoff.grow();

        if start.elapsed() >= budget {
            break;
        }
    }

    if config.verbose_logging {
        debug!(
            attempts = attempt,
            elapsed_ms = start.elapsed().as_millis() as u64,
            cancelled = cancel.is_cancelled(),
            "retry loop gave up"
        );
    }

    T::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn delays(mut backoff: Backoff, steps: usize) -> Vec<u64> {
        let mut out = vec![backoff.current_ms()];
        for _ in 0..steps {
            backoff.grow();
            out.push(backoff.current_ms());
        }
        out
    }

    #[test]
    fn test_backoff_sequence() {
        let sequence = delays(Backoff::new(100, 5000, 1.5), 12);
        assert_eq!(
            &sequence[..8],
            &[100, 150, 225, 338, 507, 761, 1142, 1713]
        );
        assert_eq!(*sequence.last().unwrap(), 5000);
        assert!(sequence.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_backoff_reaches_ceiling_and_resets() {
        let mut backoff = Backoff::new(1000, 1000, 3.0);
        assert_eq!(backoff.grow(), Duration::from_millis(1000));

        let mut backoff = Backoff::new(50, 1000, 1.1);
        let mut steps = 0;
        while backoff.current_ms() < 1000 {
            backoff.grow();
            steps += 1;
            assert!(steps < 100, "ceiling not reached");
        }
        backoff.reset();
        assert_eq!(backoff.current_ms(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_makes_exactly_one_attempt() {
        let config = ValidatorConfig::default();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let result: bool = retry_with_backoff(
            move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(false)
                }
            },
            Duration::ZERO,
            &config,
            &CancellationToken::new(),
        )
        .await;

        assert!(!result);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_swallowed_until_success() {
        let config = ValidatorConfig::default();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let result: bool = retry_with_backoff(
            move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    match counter.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(Error::http("connection reset")),
                        1 => Ok(false),
                        _ => Ok(true),
                    }
                }
            },
            Duration::from_secs(3),
            &config,
            &CancellationToken::new(),
        )
        .await;

        assert!(result);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_bounds_attempts() {
        // Attempts at 0, 100, 250, 475 and 813ms; the 507ms sleep after the
        // fifth attempt runs past the one second budget.
        let config = ValidatorConfig::default();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let start = Instant::now();
        let result: u32 = retry_with_backoff(
            move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(0u32)
                }
            },
            Duration::from_secs(1),
            &config,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result, 0);
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_sleep_returns_default() {
        let config = ValidatorConfig::default();
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicUsize::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            trigger.cancel();
        });

        let counter = Arc::clone(&attempts);
        let result: bool = retry_with_backoff(
            move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(false)
                }
            },
            Duration::from_secs(10),
            &config,
            &cancel,
        )
        .await;

        assert!(!result);
        // attempts at t=0 and t=100, cancelled during the 150ms sleep
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
