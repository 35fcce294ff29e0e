//! # Retry scheduler.
//!
//! Holds at most one pending retry per controller. A pending retry is a sleeping
//! task guarded by a [`CancellationToken`]; scheduling a new one, or calling
//! [`cancel`](Scheduler::cancel), voids the previous one.
//!
//! A retry that has already fired may still sit in the controller queue when it
//! gets cancelled. The controller therefore runs a fired retry only if
//! [`claim`](Scheduler::claim) confirms it is still the pending one.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

struct Pending {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    pending: Option<Pending>,
}

/// Single-slot delayed command scheduler.
#[derive(Default)]
pub(crate) struct Scheduler {
    slot: Mutex<Slot>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedules `fire(id)` after `delay`, replacing any pending retry.
    pub(crate) fn schedule<F>(&self, runtime: &Handle, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let token = CancellationToken::new();
        let id = {
            let mut slot = self.slot.lock();
            if let Some(prev) = slot.pending.take() {
                prev.token.cancel();
            }
            slot.next_id += 1;
            let id = slot.next_id;
            slot.pending = Some(Pending {
                id,
                token: token.clone(),
            });
            id
        };

        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => fire(id),
            }
        });
        id
    }

    /// Cancels the pending retry. Returns `true` if one was pending.
    pub(crate) fn cancel(&self) -> bool {
        match self.slot.lock().pending.take() {
            Some(prev) => {
                prev.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Consumes the pending retry if it is still `id`.
    pub(crate) fn claim(&self, id: u64) -> bool {
        let mut slot = self.slot.lock();
        match &slot.pending {
            Some(p) if p.id == id => {
                slot.pending = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(prev) = self.slot.get_mut().pending.take() {
            prev.token.cancel();
        }
    }
}
