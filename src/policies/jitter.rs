//! # Jitter for reconnect delays.
//!
//! Many proxies losing the same remote endpoint at once would otherwise retry in
//! lockstep. [`JitterPolicy`] spreads those retries.

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a computed reconnect delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact delay.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// `delay/2` plus uniform in `[0, delay/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies the policy to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        let mut rng = rand::rng();
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rng.random_range(0..=ms - half))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(1234);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_stays_in_range() {
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(Duration::from_millis(50)) <= Duration::from_millis(50));
        }
    }

    #[test]
    fn zero_delay_is_untouched() {
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
