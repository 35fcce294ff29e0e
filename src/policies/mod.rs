//! Reconnect policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how long to wait before re-connecting after a loss
//! - [`JitterPolicy`]  randomization to keep proxies from reconnecting in lockstep
//!
//! ## Quick wiring
//! ```text
//! Config { retry: BackoffPolicy }
//!      └─► Context::retry()
//!           └─► Connection: on "disconnected" → retry.next(consecutive_losses)
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
