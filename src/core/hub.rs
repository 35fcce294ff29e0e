//! # Hub: the constructed entry point that owns the registry and the scopes.
//!
//! A [`Hub`] replaces a process-wide facade with an explicit object. It owns the
//! provider [`Registry`], the event [`Bus`] with its [`SubscriberSet`], the root
//! [`Broker`] and one [`Client`] per unit scope.
//!
//! ## Architecture
//! ```text
//! Hub::builder(cfg).build()
//!   ├─► Bus ──► listener ──► SubscriberSet ──► subscriber workers
//!   ├─► Registry ◄── use_provider(p)
//!   └─► scopes:
//!         ScopeKey::Root        ──► Broker (lazy, shared)
//!         ScopeKey::Unit(name)  ──► Client ──► Broker
//! ```
//!
//! ## Rules
//! - `startup(key)` creates the scope on first use, then starts it.
//! - `shutdown(key)` removes the scope from the hub and shuts it down; unknown keys are a no-op.
//! - `from(key)` only returns scopes that were started through the hub.
//! - `close()` shuts every scope down, drains subscriber workers and reports the first
//!   shutdown error.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lazylink::{Config, Hub, LocalProxy, ProviderFn, Scope, ScopeKey, ServiceType};
//!
//! struct Clock;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), lazylink::BrokerError> {
//!     let hub = Hub::builder(Config::default()).build()?;
//!     hub.use_provider(ProviderFn::arc([ServiceType::of::<Clock>()], |_ty, _ctx| {
//!         Ok(LocalProxy::arc(Arc::new(Clock)))
//!     }));
//!
//!     let unit = hub.startup(&ScopeKey::unit("screen"))?;
//!     let _consumer = unit.require_service::<Clock, _>(|clock, _ty| {
//!         assert!(clock.is_some());
//!     })?;
//!
//!     hub.close().await?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::builder::HubBuilder;
use crate::error::BrokerError;
use crate::events::Bus;
use crate::registry::{ProviderRef, Registry};
use crate::scope::{Broker, Client, Context, Scope, ScopeRef};
use crate::subscribers::SubscriberSet;

/// Identifies a scope managed by a [`Hub`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// The application-wide broker.
    Root,
    /// A named client bound to the root broker.
    Unit(Arc<str>),
}

impl ScopeKey {
    pub fn unit(name: impl Into<Arc<str>>) -> Self {
        ScopeKey::Unit(name.into())
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Root => f.write_str("root"),
            ScopeKey::Unit(name) => write!(f, "unit:{name}"),
        }
    }
}

#[derive(Default)]
struct HubState {
    root: Option<Arc<Broker>>,
    units: IndexMap<Arc<str>, Arc<Client>>,
}

/// Owner of the registry, the event plumbing and every scope.
pub struct Hub {
    cfg: Config,
    ctx: Context,
    registry: Arc<Registry>,
    state: Mutex<HubState>,
    subs: Mutex<Option<Arc<SubscriberSet>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    closing: CancellationToken,
}

impl Hub {
    /// Starts building a hub with `cfg`.
    pub fn builder(cfg: Config) -> HubBuilder {
        HubBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        ctx: Context,
        registry: Arc<Registry>,
        subs: Arc<SubscriberSet>,
    ) -> Self {
        Self {
            cfg,
            ctx,
            registry,
            state: Mutex::new(HubState::default()),
            subs: Mutex::new(Some(subs)),
            listener: Mutex::new(None),
            closing: CancellationToken::new(),
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    pub(crate) fn subscriber_listener(&self) {
        let Some(set) = self.subs.lock().clone() else {
            return;
        };
        let mut rx = self.ctx.bus().subscribe();
        let closing = self.closing.clone();

        let handle = self.ctx.runtime().spawn(async move {
            loop {
                tokio::select! {
                    _ = closing.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
        *self.listener.lock() = Some(handle);
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Root scope context (name, bus, runtime, binder, retry policy).
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn bus(&self) -> &Bus {
        self.ctx.bus()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Installs a provider. Returns `false` if it was already installed.
    pub fn use_provider(&self, provider: ProviderRef) -> bool {
        self.registry.use_provider(provider)
    }

    /// The root broker, created on first call (or after the previous one was shut down).
    pub fn root(&self) -> Result<Arc<Broker>, BrokerError> {
        let mut st = self.state.lock();
        if let Some(root) = st.root.as_ref().filter(|b| !b.is_shutdown()) {
            return Ok(root.clone());
        }
        let root = Broker::new(self.ctx.clone(), self.registry.clone())?;
        st.root = Some(root.clone());
        Ok(root)
    }

    /// Creates the scope for `key` if needed and starts it.
    ///
    /// The scope stays registered in the hub even if starting it reported an error.
    pub fn startup(&self, key: &ScopeKey) -> Result<ScopeRef, BrokerError> {
        let scope: ScopeRef = match key {
            ScopeKey::Root => self.root()?,
            ScopeKey::Unit(name) => self.unit(name)?,
        };
        scope.startup()?;
        Ok(scope)
    }

    /// Removes the scope for `key` and shuts it down.
    pub fn shutdown(&self, key: &ScopeKey) -> Result<(), BrokerError> {
        let scope: Option<ScopeRef> = {
            let mut st = self.state.lock();
            match key {
                ScopeKey::Root => st.root.take().map(|b| b as ScopeRef),
                ScopeKey::Unit(name) => st.units.shift_remove(name).map(|c| c as ScopeRef),
            }
        };
        match scope {
            Some(scope) => scope.shutdown(),
            None => Ok(()),
        }
    }

    /// Returns the scope for `key`.
    ///
    /// # Errors
    /// [`BrokerError::IllegalState`] if `startup(key)` was never called (or the scope was
    /// shut down since).
    pub fn from(&self, key: &ScopeKey) -> Result<ScopeRef, BrokerError> {
        let st = self.state.lock();
        let scope: Option<ScopeRef> = match key {
            ScopeKey::Root => st.root.clone().map(|b| b as ScopeRef),
            ScopeKey::Unit(name) => st.units.get(name).cloned().map(|c| c as ScopeRef),
        };
        scope.ok_or_else(|| {
            BrokerError::illegal_state(key.to_string(), "startup must be invoked first")
        })
    }

    /// Keys of the scopes currently held, root first.
    pub fn scopes(&self) -> Vec<ScopeKey> {
        let st = self.state.lock();
        let root = st.root.as_ref().map(|_| ScopeKey::Root);
        root.into_iter()
            .chain(st.units.keys().cloned().map(ScopeKey::Unit))
            .collect()
    }

    /// Shuts every scope down (units first), then drains the subscriber workers.
    ///
    /// Every scope is shut down even if an earlier one fails.
    ///
    /// # Errors
    /// The first error returned by a scope shutdown.
    pub async fn close(&self) -> Result<(), BrokerError> {
        let (units, root) = {
            let mut st = self.state.lock();
            let units: Vec<Arc<Client>> = st.units.drain(..).map(|(_, c)| c).collect();
            (units, st.root.take())
        };
        let mut first = None;
        for unit in units {
            if let Err(err) = unit.shutdown() {
                first.get_or_insert(err);
            }
        }
        if let Some(root) = root {
            if let Err(err) = root.shutdown() {
                first.get_or_insert(err);
            }
        }

        tokio::task::yield_now().await;
        self.closing.cancel();
        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
        let subs = self.subs.lock().take();
        if let Some(set) = subs.and_then(|s| Arc::try_unwrap(s).ok()) {
            set.shutdown().await;
        }
        first.map_or(Ok(()), Err)
    }

    fn unit(&self, name: &Arc<str>) -> Result<Arc<Client>, BrokerError> {
        if let Some(client) = self.state.lock().units.get(name).filter(|c| !c.is_shutdown()) {
            return Ok(client.clone());
        }
        let client = Client::new(name.clone(), self.root()?)?;
        let mut st = self.state.lock();
        match st.units.get(name) {
            Some(existing) if !existing.is_shutdown() => Ok(existing.clone()),
            _ => {
                st.units.insert(name.clone(), client.clone());
                Ok(client)
            }
        }
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("root", &self.ctx.name())
            .field("providers", &self.registry.len())
            .field("scopes", &self.scopes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::events::{Event, EventKind};
    use crate::registry::ProviderFn;
    use crate::scope::Resolver;
    use crate::service::{Consumer, LocalProxy, ServiceType};
    use crate::subscribers::Subscribe;
    use crate::connection::ConnectionProxy;
    use crate::scope::Context;
    use crate::test_support::{CountingProvider, Echo, EchoConnector, ScriptedBinder, settle};

    #[derive(Default)]
    struct Starts(AtomicUsize);

    #[async_trait]
    impl Subscribe for Starts {
        async fn on_event(&self, ev: &Event) {
            if ev.kind == EventKind::ScopeStarted {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn name(&self) -> &'static str {
            "starts"
        }
    }

    fn hub() -> Arc<Hub> {
        let hub = Hub::builder(Config::default()).build().expect("hub");
        hub.use_provider(ProviderFn::arc([ServiceType::of::<Echo>()], |_, _| {
            Ok(LocalProxy::arc(Arc::new(Echo)))
        }));
        hub
    }

    #[test]
    fn build_requires_a_runtime() {
        let err = Hub::builder(Config::default()).build().expect_err("no runtime");
        assert_eq!(err.as_label(), "invalid_argument");
    }

    #[tokio::test]
    async fn from_requires_startup() {
        let hub = hub();
        let err = hub.from(&ScopeKey::unit("screen")).err().expect("unknown");
        assert_eq!(err.as_label(), "illegal_state");
        assert!(hub.from(&ScopeKey::Root).is_err());
    }

    #[tokio::test]
    async fn unit_startup_brings_up_the_root() {
        let hub = hub();
        let key = ScopeKey::unit("screen");

        let unit = hub.startup(&key).expect("startup");
        assert!(unit.is_startup());
        assert_eq!(unit.name(), "screen");

        let root = hub.from(&ScopeKey::Root).expect("root created");
        assert!(root.is_startup());
        assert_eq!(hub.scopes(), vec![ScopeKey::Root, key.clone()]);

        let again = hub.from(&key).expect("known");
        assert_eq!(again.name(), "screen");
    }

    #[tokio::test]
    async fn local_service_resolves_through_a_unit() {
        let hub = hub();
        let unit = hub.startup(&ScopeKey::unit("screen")).expect("startup");

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let consumer = unit
            .require_service::<Echo, _>(move |echo, _| {
                if echo.is_some_and(|e| e.ping() == "pong") {
                    h.fetch_add(1, Ordering::SeqCst);
                }
            })
            .expect("require");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        unit.release(&consumer).expect("release");
        let root = hub.root().expect("root");
        assert!(root.services().is_empty());
    }

    #[tokio::test]
    async fn unit_shutdown_forgets_the_scope_and_keeps_the_root() {
        let hub = Hub::builder(Config::default()).build().expect("hub");
        let provider = CountingProvider::arc::<Echo>();
        hub.use_provider(provider.clone());
        let key = ScopeKey::unit("screen");

        let unit = hub.startup(&key).expect("startup");
        unit.require(ServiceType::of::<Echo>(), Consumer::new(|_, _| {}))
            .expect("require");

        hub.shutdown(&key).expect("shutdown");
        assert!(unit.is_shutdown());
        assert!(hub.from(&key).is_err());
        assert!(hub.from(&ScopeKey::Root).expect("root").is_startup());
        let proxy = provider.last().expect("proxy");
        assert_eq!(proxy.shutdowns.load(Ordering::SeqCst), 1);

        hub.shutdown(&key).expect("unknown key is a no-op");
        let fresh = hub.startup(&key).expect("fresh unit");
        assert!(fresh.is_startup());
    }

    #[tokio::test]
    async fn subscribers_observe_scope_events() {
        let starts = Arc::new(Starts::default());
        let hub = Hub::builder(Config::default())
            .with_subscribers(vec![starts.clone()])
            .build()
            .expect("hub");

        hub.startup(&ScopeKey::unit("screen")).expect("startup");
        settle().await;
        hub.close().await.expect("close");

        assert_eq!(starts.0.load(Ordering::SeqCst), 2);
        assert!(hub.scopes().is_empty());
    }

    #[tokio::test]
    async fn close_reports_the_first_shutdown_error() {
        let binder = ScriptedBinder::arc();
        let hub = Hub::builder(Config::default())
            .with_binder(binder.clone())
            .with_provider(ProviderFn::arc(
                [ServiceType::of::<Echo>()],
                |_: ServiceType, ctx: &Context| {
                    Ok(ConnectionProxy::arc(EchoConnector::declarative("echo"), ctx))
                },
            ))
            .build()
            .expect("hub");

        let unit = hub.startup(&ScopeKey::unit("screen")).expect("startup");
        unit.require(ServiceType::of::<Echo>(), Consumer::new(|_, _| {}))
            .expect("require");
        binder.last_link().expect("bound").connected_with(Arc::new(Echo));
        settle().await;

        binder.fail_unbind(true);
        let err = hub.close().await.expect_err("unbind refused");
        assert_eq!(err.as_label(), "disconnect_failed");
        assert!(unit.is_shutdown());
        assert!(hub.scopes().is_empty());
    }
}
