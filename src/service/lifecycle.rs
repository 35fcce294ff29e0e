//! Started/shutdown flag pair shared by scopes and proxies.
//!
//! `started` and `shutdown` are never both set, and `shutdown` is sticky.

/// Lifecycle flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
    started: bool,
    shutdown: bool,
}

impl Lifecycle {
    /// Fresh, neither started nor shut down.
    pub const fn new() -> Self {
        Self {
            started: false,
            shutdown: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Marks started. Returns `true` only on the transition.
    ///
    /// Never transitions out of shutdown.
    pub fn start(&mut self) -> bool {
        if self.started || self.shutdown {
            return false;
        }
        self.started = true;
        true
    }

    /// Marks shut down. Returns `true` only on the transition.
    pub fn stop(&mut self) -> bool {
        if self.shutdown {
            return false;
        }
        self.started = false;
        self.shutdown = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_is_sticky() {
        let mut lc = Lifecycle::new();
        assert!(lc.start());
        assert!(!lc.start());
        assert!(lc.stop());
        assert!(!lc.stop());
        assert!(!lc.start());
        assert!(lc.is_shutdown());
        assert!(!lc.is_started());
    }

    #[test]
    fn stop_without_start_is_terminal() {
        let mut lc = Lifecycle::new();
        assert!(lc.stop());
        assert!(!lc.start());
    }
}
