use std::sync::Arc;

use tokio::runtime::Handle;

use super::hub::Hub;
use crate::{
    config::Config,
    connection::Binder,
    error::BrokerError,
    events::Bus,
    registry::{ProviderRef, Registry},
    scope::Context,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Hub`] with optional features.
pub struct HubBuilder {
    cfg: Config,
    root_name: Arc<str>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    providers: Vec<ProviderRef>,
    binder: Option<Arc<dyn Binder>>,
    runtime: Option<Handle>,
}

impl HubBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            root_name: Arc::from("root"),
            subscribers: Vec::new(),
            providers: Vec::new(),
            binder: None,
            runtime: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (scope lifecycle, connection transitions,
    /// retries) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Installs the binder used by declarative connectors.
    pub fn with_binder(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Runs connection workers and subscribers on `runtime` instead of the current one.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Names the root broker (default `"root"`).
    pub fn with_root_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.root_name = name.into();
        self
    }

    /// Installs a provider before the hub is built.
    pub fn with_provider(mut self, provider: ProviderRef) -> Self {
        self.providers.push(provider);
        self
    }

    /// Builds the hub and starts its subscriber listener.
    ///
    /// # Errors
    /// [`BrokerError::InvalidArgument`] if the root name is empty or no runtime is
    /// available (neither set with [`with_runtime`](Self::with_runtime) nor current).
    pub fn build(self) -> Result<Arc<Hub>, BrokerError> {
        if self.root_name.is_empty() {
            return Err(BrokerError::invalid_argument("root scope name is empty"));
        }
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()
                .map_err(|e| BrokerError::invalid_argument(format!("no tokio runtime: {e}")))?,
        };

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone(), &runtime));

        let mut ctx = Context::new(self.root_name, bus, runtime).with_retry(self.cfg.retry);
        if let Some(binder) = self.binder {
            ctx = ctx.with_binder(binder);
        }

        let registry = Registry::new();
        for provider in self.providers {
            registry.use_provider(provider);
        }

        let hub = Arc::new(Hub::new_internal(self.cfg, ctx, registry, subs));
        hub.subscriber_listener();
        Ok(hub)
    }
}
