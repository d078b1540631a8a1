//! Wait mechanisms for synchronizing with the page.
//!
//! Every driver action is fire-and-forget from the page's point of view, so
//! the verifier polls for the state it needs (element present, requests
//! settled) instead of sleeping.

use crate::result::ProbeResult;
use std::future::Future;
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for element lookups and persist actions (5 seconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5_000;

/// Default timeout for navigation (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options suited to page navigation
    #[must_use]
    pub const fn navigation() -> Self {
        Self {
            timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a wait operation
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Whether the condition held before the timeout
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of times the condition was checked
    pub attempts: u32,
    /// Description of what was waited for
    pub waited_for: String,
}

impl WaitResult {
    /// Create a successful wait result
    #[must_use]
    pub fn success(elapsed: Duration, attempts: u32, waited_for: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed,
            attempts,
            waited_for: waited_for.into(),
        }
    }

    /// Create a timeout wait result
    #[must_use]
    pub fn timeout(elapsed: Duration, attempts: u32, waited_for: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed,
            attempts,
            waited_for: waited_for.into(),
        }
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Poll an async condition until it holds or the timeout elapses.
///
/// The condition is always checked at least once. Errors from the condition
/// abort the wait immediately; a timeout is reported through
/// [`WaitResult::success`] so callers can raise the error that fits (a missing
/// element is not the same failure as a persist that never settled).
pub async fn poll_until<F, Fut>(
    options: &WaitOptions,
    waited_for: &str,
    mut condition: F,
) -> ProbeResult<WaitResult>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<bool>>,
{
    let start = Instant::now();
    let timeout = options.timeout();
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);
        if condition().await? {
            return Ok(WaitResult::success(start.elapsed(), attempts, waited_for));
        }
        if start.elapsed() >= timeout {
            tracing::debug!(waited_for, attempts, "wait timed out");
            return Ok(WaitResult::timeout(start.elapsed(), attempts, waited_for));
        }
        tokio::time::sleep(options.poll_interval()).await;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::result::ProbeError;
    use std::sync::atomic::{AtomicU32, Ordering};

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_default() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_ACTION_TIMEOUT_MS);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }

        #[test]
        fn test_navigation_options() {
            let opts = WaitOptions::navigation();
            assert_eq!(opts.timeout_ms, 30_000);
        }

        #[test]
        fn test_builder_and_durations() {
            let opts = WaitOptions::new().with_timeout(200).with_poll_interval(10);
            assert_eq!(opts.timeout(), Duration::from_millis(200));
            assert_eq!(opts.poll_interval(), Duration::from_millis(10));
        }
    }

    mod poll_tests {
        use super::*;

        #[tokio::test]
        async fn test_immediate_success() {
            let opts = WaitOptions::new().with_timeout(100).with_poll_interval(1);
            let result = poll_until(&opts, "always", || async { Ok(true) })
                .await
                .unwrap();
            assert!(result.success);
            assert_eq!(result.attempts, 1);
            assert_eq!(result.waited_for, "always");
        }

        #[tokio::test]
        async fn test_success_after_retries() {
            let calls = AtomicU32::new(0);
            let opts = WaitOptions::new().with_timeout(1_000).with_poll_interval(1);
            let result = poll_until(&opts, "third call", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n >= 2) }
            })
            .await
            .unwrap();
            assert!(result.success);
            assert_eq!(result.attempts, 3);
        }

        #[tokio::test]
        async fn test_timeout_reports_failure() {
            let opts = WaitOptions::new().with_timeout(20).with_poll_interval(5);
            let result = poll_until(&opts, "never", || async { Ok(false) })
                .await
                .unwrap();
            assert!(!result.success);
            assert!(result.attempts >= 2);
            assert!(result.elapsed >= Duration::from_millis(20));
        }

        #[tokio::test]
        async fn test_condition_error_aborts() {
            let opts = WaitOptions::new().with_timeout(1_000).with_poll_interval(1);
            let err = poll_until(&opts, "broken", || async {
                Err::<bool, _>(ProbeError::script("boom"))
            })
            .await
            .unwrap_err();
            assert!(err.to_string().contains("boom"));
        }

        #[tokio::test]
        async fn test_zero_timeout_checks_once() {
            let opts = WaitOptions::new().with_timeout(0);
            let result = poll_until(&opts, "once", || async { Ok(false) })
                .await
                .unwrap();
            assert!(!result.success);
            assert_eq!(result.attempts, 1);
        }
    }
}
