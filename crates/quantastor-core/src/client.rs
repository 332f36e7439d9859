//! HTTP client defaults and retry logic.
//!
//! This module provides HTTP client configuration and the bounded
//! retry-with-back-off executor used around task polling.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

/// Default timeout for a single management API request (seconds)
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default TCP connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

// Retry settings

/// Default total number of tries (first attempt included)
pub const DEFAULT_MAX_TRIES: u32 = 6;

/// Default delay before the first retry in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3000;

/// Default back-off multiplier applied after every retry
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Retry policy with exponential back-off.
///
/// With the defaults an operation is tried six times and the sleeps between
/// tries are 3, 6, 12, 24 and 48 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of tries, including the first one
    pub max_tries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Factor applied to the delay after every retry
    pub backoff_multiplier: u32,

    /// Optional cap on a single delay
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: None,
        }
    }

    /// Create a retry policy that runs the operation exactly once.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_tries: 1,
            initial_delay: Duration::from_millis(0),
            backoff_multiplier: 1,
            max_delay: None,
        }
    }

    /// Set the total number of tries.
    #[must_use]
    pub const fn with_max_tries(mut self, tries: u32) -> Self {
        self.max_tries = tries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the back-off multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Cap every individual delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Calculate the delay slept before retry number `retry` (1-based).
    ///
    /// delay = `initial_delay` * multiplier^(retry - 1), capped at `max_delay`.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.backoff_multiplier.saturating_pow(retry - 1);
        let delay = self.initial_delay.saturating_mul(multiplier);

        match self.max_delay {
            Some(cap) => std::cmp::min(delay, cap),
            None => delay,
        }
    }

    /// Check if retries are enabled.
    #[must_use]
    pub const fn has_retries(&self) -> bool {
        self.max_tries > 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `operation` under `policy`, retrying failures accepted by `is_retryable`.
///
/// Every try but the last is guarded: a retryable failure sleeps for the
/// current delay and tries again, any other failure is returned at once. The
/// final try is unguarded and its outcome is returned as is.
///
/// # Errors
///
/// Returns the first non-retryable error, or the error of the final try.
pub async fn retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    mut is_retryable: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E) -> bool,
    E: Display,
{
    let max_tries = policy.max_tries.max(1);
    let mut attempt = 1;

    while attempt < max_tries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) => {
                let delay = policy.delay_for_retry(attempt);
                warn!(attempt, max_tries, error = %err, "Retryable failure");
                if !delay.is_zero() {
                    debug!("Retrying after {:?}", delay);
                    sleep(delay).await;
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }

    operation().await
}

/// HTTP client configuration.
///
/// Configures timeouts and connection pooling of the underlying HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable response compression
    pub enable_compression: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_compression: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
