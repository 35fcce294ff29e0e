//! # Connection link.
//!
//! A [`ConnectionLink`] is what a collaborator holds while a connect is in flight
//! or established. Every call posts a signal onto the owning controller's
//! serialized queue; nothing runs on the caller's stack.
//!
//! Each link is stamped with the epoch of the `make` that issued it. Once the
//! controller moves on (reset, a lost connection, a newer make) the old link
//! goes stale and its signals are dropped by the controller.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::connection::connector::RawHandle;

/// Message drained by a controller worker.
pub(crate) enum Signal {
    Connected { epoch: u64, raw: RawHandle },
    Disconnected { epoch: u64 },
    Failed { epoch: u64, reason: String },
    Retry { id: u64 },
}

/// Handle through which a collaborator reports connection outcomes.
#[derive(Clone)]
pub struct ConnectionLink {
    epoch: u64,
    tx: mpsc::UnboundedSender<Signal>,
}

impl ConnectionLink {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { epoch, tx }
    }

    /// Epoch of the connect attempt this link belongs to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Reports a live connection with a raw handle for [`Connector::convert`](crate::Connector::convert).
    pub fn connected(&self, raw: RawHandle) {
        self.post(Signal::Connected {
            epoch: self.epoch,
            raw,
        });
    }

    /// Reports a live connection with an already typed service.
    pub fn connected_with<S: ?Sized + Send + Sync + 'static>(&self, service: Arc<S>) {
        self.connected(Arc::new(service));
    }

    /// Reports that an established connection dropped.
    pub fn disconnected(&self) {
        self.post(Signal::Disconnected { epoch: self.epoch });
    }

    /// Reports that the connect attempt failed.
    pub fn failed(&self, reason: impl Into<String>) {
        self.post(Signal::Failed {
            epoch: self.epoch,
            reason: reason.into(),
        });
    }

    /// Returns `true` if the owning controller is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn post(&self, signal: Signal) {
        let _ = self.tx.send(signal);
    }
}

impl fmt::Debug for ConnectionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionLink")
            .field("epoch", &self.epoch)
            .finish()
    }
}
