//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for a [`Hub`](crate::Hub) and the
//! scopes and connections it creates.
//!
//! Config is used in two ways:
//! 1. **Hub creation**: `Hub::builder(config)`
//! 2. **Connection defaults**: every [`Context`](crate::Context) built by the hub
//!    carries `config.retry`, which connections use after an unexpected disconnect.

use crate::policies::BackoffPolicy;

/// Global configuration for the broker runtime.
///
/// ## Field semantics
/// - `retry`: delay policy for automatic reconnect after a lost connection
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Reconnect delay after an established connection drops.
    ///
    /// The default is a constant 1s with no jitter and no attempt cap.
    pub retry: BackoffPolicy,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `retry = BackoffPolicy::default()` (constant 1s)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            retry: BackoffPolicy::default(),
            bus_capacity: 1024,
        }
    }
}
