//! # Reconnect delay policy.
//!
//! [`BackoffPolicy`] decides how long a [`Connection`](crate::Connection) waits
//! before re-issuing `make` after an established connection dropped.
//!
//! The delay for consecutive loss `n` (0-based, reset on every successful connect)
//! is `first × factor^n`, clamped to `max`, then jittered. The default is a constant
//! one-second cadence with no jitter and no attempt cap: a flapping endpoint is
//! retried forever at the same rate. Callers that need a cap layer it externally.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use lazylink::BackoffPolicy;
//!
//! let constant = BackoffPolicy::default();
//! assert_eq!(constant.next(0), Duration::from_secs(1));
//! assert_eq!(constant.next(50), Duration::from_secs(1));
//!
//! let growing = BackoffPolicy::exponential(
//!     Duration::from_millis(250),
//!     Duration::from_secs(4),
//!     2.0,
//! );
//! assert_eq!(growing.next(2), Duration::from_secs(1));
//! assert_eq!(growing.next(9), Duration::from_secs(4));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Reconnect delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry after a loss.
    pub first: Duration,
    /// Upper bound for any computed delay.
    pub max: Duration,
    /// Multiplicative growth per consecutive loss (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 1s delay, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Same delay for every retry.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay grows by `factor` per consecutive loss, up to `max`.
    pub fn exponential(first: Duration, max: Duration, factor: f64) -> Self {
        Self {
            first,
            max,
            factor,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns a copy with the given jitter.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the delay before retry number `attempt` (0-based).
    ///
    /// Non-finite or negative intermediate values clamp to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}
