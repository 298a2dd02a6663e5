//! Retry limits and backoff for the retry-limiter stage.
//!
//! A [`RetryPolicy`] bounds how often a chain may restart and, optionally,
//! how long the [`MaxRetryInterceptor`](crate::MaxRetryInterceptor) waits
//! before letting a retried attempt continue.
//!
//! By default a retried attempt runs immediately (`base_delay` is zero).
//! A non-zero base delay enables exponential backoff with jitter, following
//! the [gRPC connection backoff specification](https://github.com/grpc/grpc/blob/master/doc/connection-backoff.md).
//!
//! # Example
//!
//! ```
//! use gqlchain_client::RetryPolicy;
//! use std::time::Duration;
//!
//! // 3 retries, no delay
//! let policy = RetryPolicy::default();
//!
//! // 5 retries with exponential backoff starting at 100ms
//! let policy = RetryPolicy::new()
//!     .max_retries(5)
//!     .base_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(10));
//! assert!(policy.validate().is_ok());
//! ```

use std::time::Duration;

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    /// Default delay before the first retried attempt.
    pub const BASE_DELAY: Duration = Duration::ZERO;

    /// Default multiplier for exponential backoff.
    pub const MULTIPLIER: f64 = 1.6;

    /// Default jitter factor (0.2 means +/- 20%).
    pub const JITTER: f64 = 0.2;

    /// Default maximum delay between retries.
    pub const MAX_DELAY: Duration = Duration::from_secs(120);

    /// Default maximum number of retries.
    pub const MAX_RETRIES: u32 = 3;
}

/// Configuration for retry limiting.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `base_delay`: zero (no backoff)
/// - `multiplier`: 1.6
/// - `jitter`: 0.2 (20%)
/// - `max_delay`: 120 seconds
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the initial attempt).
    pub max_retries: u32,

    /// Delay before the first retried attempt. Zero disables backoff.
    pub base_delay: Duration,

    /// Multiplier for exponential backoff. Should be >= 1.0.
    pub multiplier: f64,

    /// Jitter factor for randomizing delays. Value between 0.0 and 1.0.
    pub jitter: f64,

    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_delay: defaults::BASE_DELAY,
            multiplier: defaults::MULTIPLIER,
            jitter: defaults::JITTER,
            max_delay: defaults::MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a new RetryPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy that rejects any retry.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a policy with exponential backoff starting at one second.
    pub fn exponential() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retried attempt.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is less than 1.0.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        assert!(multiplier >= 1.0, "multiplier must be >= 1.0");
        self.multiplier = multiplier;
        self
    }

    /// Set the jitter factor.
    ///
    /// # Panics
    ///
    /// Panics if `jitter` is not between 0.0 and 1.0.
    pub fn jitter(mut self, jitter: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&jitter),
            "jitter must be between 0.0 and 1.0"
        );
        self.jitter = jitter;
        self
    }

    /// Validate the policy configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.base_delay > self.max_delay {
            return Err("base_delay must not exceed max_delay");
        }
        if self.multiplier < 1.0 {
            return Err("multiplier must be >= 1.0");
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err("jitter must be between 0.0 and 1.0");
        }
        Ok(())
    }

    /// Returns `true` if retried attempts are delayed.
    pub fn has_backoff(&self) -> bool {
        !self.base_delay.is_zero()
    }

    /// Create an ExponentialBackoff from this policy.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.clone())
    }
}

/// Exponential backoff with jitter.
///
/// The sequence follows `base * multiplier^attempt`, randomized by
/// `+/- jitter` and clamped to `max_delay`.
///
/// ```
/// use gqlchain_client::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new().base_delay(Duration::from_millis(100)).jitter(0.0);
/// let mut backoff = policy.backoff();
/// assert_eq!(backoff.next_delay(), Duration::from_millis(100));
/// assert_eq!(backoff.next_delay(), Duration::from_millis(160));
/// ```
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    /// Current delay without jitter, stored as f64 to avoid rounding errors.
    current_delay_secs: f64,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        let current_delay_secs = policy.base_delay.as_secs_f64();
        Self {
            policy,
            current_delay_secs,
            attempts: 0,
        }
    }

    /// Reset the backoff to its initial state.
    pub fn reset(&mut self) {
        self.current_delay_secs = self.policy.base_delay.as_secs_f64();
        self.attempts = 0;
    }

    /// Number of delays handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Check if more retries are allowed.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.policy.max_retries
    }

    /// Get the next delay duration, applying jitter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay_secs;

        // delay * (1 + jitter * random(-1, 1))
        let jittered = if self.policy.jitter > 0.0 {
            let jitter_range = self.policy.jitter * 2.0;
            let random_factor = rand::random::<f64>() * jitter_range - self.policy.jitter;
            delay * (1.0 + random_factor)
        } else {
            delay
        };

        let clamped = jittered.min(self.policy.max_delay.as_secs_f64());

        self.current_delay_secs = (self.current_delay_secs * self.policy.multiplier)
            .min(self.policy.max_delay.as_secs_f64());
        self.attempts += 1;

        Duration::from_secs_f64(clamped.max(0.0))
    }
}
