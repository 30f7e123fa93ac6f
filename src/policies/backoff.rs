//! # Backoff policy for reconnect attempts.
//!
//! [`BackoffPolicy`] controls how the reconnect delay of a handle grows while its
//! errors keep piling up. It is parameterized by:
//! - [`BackoffPolicy::first`] the delay after the first consecutive error;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay after `k` consecutive errors is `first × factor^(k-1)`, clamped to
//! `max`; zero errors means zero delay. The delay is derived purely from the
//! error count, so it never depends on how long previous waits actually took.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::default(); // 30s, ×2, capped at 300s
//!
//! assert_eq!(backoff.for_errors(0), Duration::ZERO);
//! assert_eq!(backoff.for_errors(1), Duration::from_secs(30));
//! assert_eq!(backoff.for_errors(3), Duration::from_secs(120));
//! assert_eq!(backoff.for_errors(10), Duration::from_secs(300));
//! ```

use std::time::Duration;

/// Reconnect backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first consecutive error.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
}

impl Default for BackoffPolicy {
    /// Returns a strategy with:
    /// - `first = 30s`;
    /// - `factor = 2.0` (doubling);
    /// - `max = 300s`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(30),
            max: Duration::from_secs(300),
            factor: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// The delay is `first × factor^attempt`, clamped to [`BackoffPolicy::max`].
    /// Non-finite or negative intermediate values clamp to `max` as well.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }

    /// Delay to wait after `consecutive_errors` errors in a row.
    ///
    /// `0` errors → [`Duration::ZERO`]; `k` errors → [`next(k - 1)`](Self::next).
    pub fn for_errors(&self, consecutive_errors: u32) -> Duration {
        match consecutive_errors {
            0 => Duration::ZERO,
            k => self.next(k - 1),
        }
    }
}
