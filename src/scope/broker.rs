//! # Broker - the root scope that owns proxies.
//!
//! A [`Broker`] keeps two maps, both in insertion order:
//! - `{type → proxy}`: one proxy per service type, built lazily through the [`Registry`]
//! - `{type → [consumer]}`: every consumer interested in that type
//!
//! ## Architecture
//! ```text
//! register(ty, c) ──► Registry::create(ty) ──► proxy ◄── async_provide(fanout)
//!                                               │
//!                       connection transition ──┘
//!                                               ▼
//!                     fanout ──► dispatch(ty) ──► c1, c2, ... (consumers of ty)
//! ```
//!
//! ## Rules
//! - Every proxy gets the same internal fan-out consumer; outside consumers are never
//!   handed to a proxy directly.
//! - A proxy lives while its type has at least one consumer; the last `unregister`
//!   tears it down and the next `register` builds a fresh one.
//! - Proxies are started only once the broker is started. `startup()` catches up
//!   every consumer registered before it.
//! - Shutdown is terminal: `startup()` afterwards fails with `IllegalState`.
//! - No broker lock is held while calling a provider, a proxy or a consumer.
//! - Fan-out and synchronous catch-up pass through one reentrant delivery gate and
//!   are deduplicated per consumer, so a connection event reaches each consumer once
//!   even when the connection worker runs on another thread.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex};

use crate::error::BrokerError;
use crate::events::{Event, EventKind};
use crate::registry::Registry;
use crate::scope::context::Context;
use crate::scope::registration::{self, Registration};
use crate::scope::resolver::{Resolver, Scope};
use crate::service::{Consumer, Instance, Lifecycle, ProxyRef, ServiceType};

#[derive(Default)]
struct BrokerState {
    lifecycle: Lifecycle,
    proxies: IndexMap<ServiceType, ProxyRef>,
    consumers: IndexMap<ServiceType, Vec<Registration>>,
}

/// Root scope owning one proxy per service type.
pub struct Broker {
    ctx: Context,
    registry: Arc<Registry>,
    fanout: Consumer,
    state: Mutex<BrokerState>,
    delivery: ReentrantMutex<()>,
}

impl Broker {
    /// Creates a broker named after `ctx`.
    ///
    /// # Errors
    /// [`BrokerError::InvalidArgument`] if the scope name is empty.
    pub fn new(ctx: Context, registry: Arc<Registry>) -> Result<Arc<Self>, BrokerError> {
        if ctx.name().is_empty() {
            return Err(BrokerError::invalid_argument("broker name is empty"));
        }
        Ok(Arc::new_cyclic(|weak: &Weak<Broker>| {
            let weak = weak.clone();
            let fanout = Consumer::new(move |instance, ty| {
                if let Some(broker) = weak.upgrade() {
                    broker.dispatch(instance, ty);
                }
            });
            Self {
                ctx,
                registry,
                fanout,
                state: Mutex::new(BrokerState::default()),
                delivery: ReentrantMutex::new(()),
            }
        }))
    }

    /// Scope context handed to providers.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Registers `consumer` for `ty`, building the proxy on first use.
    ///
    /// If the broker is started, the consumer is resolved immediately, also when it was
    /// already registered. This restarts a proxy whose earlier startup failed.
    pub fn register(&self, ty: ServiceType, consumer: Consumer) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.ensure_proxy(ty)?;

        let (added, started) = {
            let mut st = self.state.lock();
            if st.lifecycle.is_shutdown() {
                return Err(self.shut_down_error());
            }
            let started = st.lifecycle.is_started();
            let list = st.consumers.entry(ty).or_default();
            if list.iter().any(|r| r.is(&consumer)) {
                (false, started)
            } else {
                list.push(Registration::new(consumer.clone()));
                (true, started)
            }
        };

        if added {
            self.ctx
                .publish(Event::new(EventKind::ConsumerRegistered).with_service(ty.name()));
        }
        if started {
            self.resolve(ty, &consumer)?;
        }
        Ok(())
    }

    /// Removes `consumer` from every type and tears down proxies left without consumers.
    pub fn unregister(&self, consumer: &Consumer) -> Result<(), BrokerError> {
        self.detach(consumer, None)
    }

    /// Removes `consumer` from `ty` only.
    pub fn unregister_service(&self, ty: ServiceType, consumer: &Consumer) -> Result<(), BrokerError> {
        self.detach(consumer, Some(ty))
    }

    /// Delivers the current instance of `ty` to `consumer`, starting the proxy if needed.
    ///
    /// An absent instance is skipped; absence is only ever signalled by the proxy.
    /// A registered consumer that already received the current instance through the
    /// fan-out is not called again.
    ///
    /// # Errors
    /// [`BrokerError::IllegalState`] if `ty` has no proxy in this broker; any error from
    /// starting the proxy.
    pub fn resolve(&self, ty: ServiceType, consumer: &Consumer) -> Result<(), BrokerError> {
        self.resolve_with(ty, |instance| {
            let fresh = {
                let mut st = self.state.lock();
                match st
                    .consumers
                    .get_mut(&ty)
                    .and_then(|list| list.iter_mut().find(|r| r.is(consumer)))
                {
                    Some(reg) => reg.offer(Some(instance)),
                    None => true,
                }
            };
            if fresh {
                consumer.accept(Some(instance), ty);
            }
        })
    }

    /// Starts the proxy of `ty` if needed and hands its current instance to `deliver`.
    ///
    /// `deliver` runs inside the delivery gate, ordered with the connection fan-out.
    pub(crate) fn resolve_with<F>(&self, ty: ServiceType, deliver: F) -> Result<(), BrokerError>
    where
        F: FnOnce(&Instance),
    {
        let (proxy, started) = {
            let st = self.state.lock();
            let proxy = st.proxies.get(&ty).cloned().ok_or_else(|| {
                BrokerError::illegal_state(self.ctx.name(), format!("{ty} is not registered"))
            })?;
            (proxy, st.lifecycle.is_started())
        };

        if started && !proxy.is_startup() {
            proxy.startup()?;
            self.ctx
                .publish(Event::new(EventKind::ProxyStarted).with_service(ty.name()));
        }
        if !proxy.is_startup() {
            return Ok(());
        }

        let _gate = self.delivery.lock();
        if let Some(instance) = proxy.provide() {
            deliver(&instance);
        }
        Ok(())
    }

    /// Proxied service types, in creation order.
    pub fn services(&self) -> Vec<ServiceType> {
        self.state.lock().proxies.keys().copied().collect()
    }

    /// Consumers registered for `ty`, in registration order.
    pub fn consumers_of(&self, ty: ServiceType) -> Vec<Consumer> {
        self.state
            .lock()
            .consumers
            .get(&ty)
            .map(|list| list.iter().map(|r| r.consumer().clone()).collect())
            .unwrap_or_default()
    }

    /// The proxy currently serving `ty`.
    pub fn proxy(&self, ty: ServiceType) -> Option<ProxyRef> {
        self.state.lock().proxies.get(&ty).cloned()
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.state.lock().lifecycle.is_shutdown() {
            return Err(self.shut_down_error());
        }
        Ok(())
    }

    fn shut_down_error(&self) -> BrokerError {
        BrokerError::illegal_state(self.ctx.name(), "scope is shut down")
    }

    fn ensure_proxy(&self, ty: ServiceType) -> Result<(), BrokerError> {
        if self.state.lock().proxies.contains_key(&ty) {
            return Ok(());
        }

        let proxy = self.registry.create(ty, &self.ctx)?;
        proxy.async_provide(Some(self.fanout.clone()));

        let outcome = {
            let mut st = self.state.lock();
            if st.lifecycle.is_shutdown() {
                Err(self.shut_down_error())
            } else if st.proxies.contains_key(&ty) {
                Ok(false)
            } else {
                st.proxies.insert(ty, proxy.clone());
                Ok(true)
            }
        };

        match outcome {
            Ok(true) => {
                self.ctx
                    .publish(Event::new(EventKind::ProxyCreated).with_service(ty.name()));
                Ok(())
            }
            // lost the race to a concurrent register
            Ok(false) => {
                proxy.async_provide(None);
                Ok(())
            }
            Err(err) => {
                proxy.async_provide(None);
                Err(err)
            }
        }
    }

    fn detach(&self, consumer: &Consumer, only: Option<ServiceType>) -> Result<(), BrokerError> {
        let (removed, released) = {
            let mut st = self.state.lock();
            let mut removed = Vec::new();
            let mut emptied = Vec::new();
            for (ty, list) in st.consumers.iter_mut() {
                if only.is_some_and(|o| o != *ty) {
                    continue;
                }
                let before = list.len();
                list.retain(|r| !r.is(consumer));
                if list.len() != before {
                    removed.push(*ty);
                    if list.is_empty() {
                        emptied.push(*ty);
                    }
                }
            }

            let mut released = Vec::with_capacity(emptied.len());
            for ty in &emptied {
                st.consumers.shift_remove(ty);
                if let Some(proxy) = st.proxies.shift_remove(ty) {
                    released.push(proxy);
                }
            }
            (removed, released)
        };

        for ty in removed {
            self.ctx
                .publish(Event::new(EventKind::ConsumerUnregistered).with_service(ty.name()));
        }
        self.release_all(released)
    }

    fn release_proxy(&self, proxy: &ProxyRef) -> Result<(), BrokerError> {
        proxy.async_provide(None);
        let result = if proxy.is_startup() && !proxy.is_shutdown() {
            proxy.shutdown()
        } else {
            Ok(())
        };

        let mut ev = Event::new(EventKind::ProxyReleased).with_service(proxy.service_type().name());
        if let Err(err) = &result {
            ev = ev.with_reason(err.as_message());
        }
        self.ctx.publish(ev);
        result
    }

    /// Releases every proxy, returning the first error.
    fn release_all(&self, proxies: Vec<ProxyRef>) -> Result<(), BrokerError> {
        let mut first = None;
        for proxy in proxies {
            if let Err(err) = self.release_proxy(&proxy) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn dispatch(&self, instance: Option<&Instance>, ty: ServiceType) {
        let _gate = self.delivery.lock();
        let consumers = {
            let mut st = self.state.lock();
            if !st.lifecycle.is_started() {
                return;
            }
            match st.consumers.get_mut(&ty) {
                Some(list) => registration::offer(list, instance),
                None => return,
            }
        };
        for consumer in consumers {
            consumer.accept(instance, ty);
        }
    }
}

impl Resolver for Broker {
    fn require(&self, ty: ServiceType, consumer: Consumer) -> Result<(), BrokerError> {
        self.register(ty, consumer)
    }

    fn release(&self, consumer: &Consumer) -> Result<(), BrokerError> {
        self.unregister(consumer)
    }
}

impl Scope for Broker {
    fn name(&self) -> &str {
        self.ctx.name()
    }

    fn startup(&self) -> Result<(), BrokerError> {
        let pending: Vec<(ServiceType, Vec<Consumer>)> = {
            let mut st = self.state.lock();
            if st.lifecycle.is_shutdown() {
                return Err(self.shut_down_error());
            }
            if !st.lifecycle.start() {
                return Ok(());
            }
            st.consumers
                .iter()
                .map(|(ty, list)| (*ty, list.iter().map(|r| r.consumer().clone()).collect()))
                .collect()
        };
        self.ctx.publish(Event::new(EventKind::ScopeStarted));

        let mut first = None;
        for (ty, consumers) in pending {
            for consumer in consumers {
                if let Err(err) = self.resolve(ty, &consumer) {
                    first.get_or_insert(err);
                    break;
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn shutdown(&self) -> Result<(), BrokerError> {
        let proxies: Vec<ProxyRef> = {
            let mut st = self.state.lock();
            if !st.lifecycle.stop() {
                return Ok(());
            }
            st.consumers.clear();
            st.proxies.drain(..).map(|(_, proxy)| proxy).collect()
        };
        self.ctx.publish(Event::new(EventKind::ScopeShutdown));
        self.release_all(proxies)
    }

    fn is_startup(&self) -> bool {
        self.state.lock().lifecycle.is_started()
    }

    fn is_shutdown(&self) -> bool {
        self.state.lock().lifecycle.is_shutdown()
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("Broker")
            .field("name", &self.ctx.name())
            .field("lifecycle", &st.lifecycle)
            .field("services", &st.proxies.keys().collect::<Vec<_>>())
            .finish()
    }
}
