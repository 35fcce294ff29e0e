//! # Owning-scope context.
//!
//! [`Context`] is the ambient handle a [`Provider`](crate::Provider) receives when it
//! builds a proxy: the owning scope's name, the event [`Bus`], the tokio runtime the
//! connection workers run on, the optional [`Binder`] used by declarative connectors,
//! and the reconnect [`BackoffPolicy`].
//!
//! Cloning is cheap; every field is shared.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::connection::Binder;
use crate::error::BrokerError;
use crate::events::{Bus, Event};
use crate::policies::BackoffPolicy;

/// Ambient handle of a scope.
#[derive(Clone)]
pub struct Context {
    name: Arc<str>,
    bus: Bus,
    runtime: Handle,
    binder: Option<Arc<dyn Binder>>,
    retry: BackoffPolicy,
}

impl Context {
    /// Creates a context with the default retry policy and no binder.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus, runtime: Handle) -> Self {
        Self {
            name: name.into(),
            bus,
            runtime,
            binder: None,
            retry: BackoffPolicy::default(),
        }
    }

    /// Creates a context on the runtime of the calling task.
    ///
    /// # Errors
    /// [`BrokerError::InvalidArgument`] when called outside a tokio runtime.
    pub fn current(name: impl Into<Arc<str>>, bus: Bus) -> Result<Self, BrokerError> {
        let runtime = Handle::try_current()
            .map_err(|e| BrokerError::invalid_argument(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(name, bus, runtime))
    }

    /// Installs the binder used by declarative connectors.
    pub fn with_binder(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Replaces the reconnect policy.
    pub fn with_retry(mut self, retry: BackoffPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Same collaborators under another scope name.
    pub fn scoped(&self, name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn binder(&self) -> Option<&Arc<dyn Binder>> {
        self.binder.as_ref()
    }

    pub fn retry(&self) -> &BackoffPolicy {
        &self.retry
    }

    /// Publishes `ev` tagged with this scope's name.
    pub(crate) fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_scope(self.name.clone()));
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("binder", &self.binder.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::EventKind;

    #[test]
    fn current_requires_a_runtime() {
        let err = Context::current("root", Bus::new(8)).expect_err("no runtime");
        assert_eq!(err.as_label(), "invalid_argument");
    }

    #[tokio::test]
    async fn scoped_keeps_collaborators() {
        let ctx = Context::current("root", Bus::new(8))
            .expect("runtime")
            .with_retry(BackoffPolicy::constant(Duration::from_millis(5)));
        let child = ctx.scoped("unit");

        assert_eq!(child.name(), "unit");
        assert_eq!(child.retry().next(3), Duration::from_millis(5));
        assert!(child.binder().is_none());
    }

    #[tokio::test]
    async fn publish_tags_the_scope() {
        let ctx = Context::current("root", Bus::new(8)).expect("runtime");
        let mut rx = ctx.bus().subscribe();

        ctx.publish(Event::new(EventKind::ScopeStarted));
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.scope.as_deref(), Some("root"));
    }
}
