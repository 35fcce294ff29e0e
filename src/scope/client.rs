//! # Client - a delegated scope bound to a broker.
//!
//! A [`Client`] owns no proxies. It keeps its own `{type → [consumer]}` map and forwards
//! interest to its [`Broker`] through a single fan-out consumer, so the broker only ever
//! sees one consumer per client and per type.
//!
//! ```text
//! client.register(ty, c) ──► local[ty] += c
//!                        └─► (first c for ty) broker.register(ty, client.fanout)
//!
//! broker dispatch(ty) ──► client.fanout ──► local[ty]: c1, c2, ...
//! ```
//!
//! ## Rules
//! - The fan-out delivers only while the client is started.
//! - Catch-up of local consumers runs through the broker's delivery gate and is
//!   deduplicated per consumer, like the broker's own fan-out.
//! - A type whose forwarding fails is rolled back on both sides, so a later
//!   `register` forwards and resolves it again.
//! - `startup()` starts the broker first, then catches up each local type once.
//! - `shutdown()` unregisters the fan-out from the broker (which tears down proxies no
//!   one else needs) and drops the broker reference. The broker keeps running.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::BrokerError;
use crate::events::{Event, EventKind};
use crate::scope::broker::Broker;
use crate::scope::context::Context;
use crate::scope::registration::{self, Registration};
use crate::scope::resolver::{Resolver, Scope};
use crate::service::{Consumer, Instance, Lifecycle, ServiceType};

#[derive(Default)]
struct ClientState {
    lifecycle: Lifecycle,
    broker: Option<Arc<Broker>>,
    consumers: IndexMap<ServiceType, Vec<Registration>>,
}

/// Delegated scope.
pub struct Client {
    ctx: Context,
    fanout: Consumer,
    state: Mutex<ClientState>,
}

impl Client {
    /// Creates a client named `name` bound to `broker`.
    ///
    /// # Errors
    /// [`BrokerError::InvalidArgument`] if `name` is empty or equals the broker's name,
    /// or if the broker is already shut down.
    pub fn new(name: impl Into<Arc<str>>, broker: Arc<Broker>) -> Result<Arc<Self>, BrokerError> {
        let name: Arc<str> = name.into();
        if name.is_empty() {
            return Err(BrokerError::invalid_argument("client name is empty"));
        }
        if &*name == broker.name() {
            return Err(BrokerError::invalid_argument(format!(
                "client name {name} collides with its broker"
            )));
        }
        if broker.is_shutdown() {
            return Err(BrokerError::invalid_argument(format!(
                "broker {} is shut down",
                broker.name()
            )));
        }

        let ctx = broker.context().scoped(name);
        Ok(Arc::new_cyclic(|weak: &Weak<Client>| {
            let weak = weak.clone();
            let fanout = Consumer::new(move |instance, ty| {
                if let Some(client) = weak.upgrade() {
                    client.dispatch(instance, ty);
                }
            });
            Self {
                ctx,
                fanout,
                state: Mutex::new(ClientState {
                    broker: Some(broker),
                    ..ClientState::default()
                }),
            }
        }))
    }

    /// The bound broker; `None` after shutdown.
    pub fn broker(&self) -> Option<Arc<Broker>> {
        self.state.lock().broker.clone()
    }

    /// Locally registered types, in registration order.
    pub fn services(&self) -> Vec<ServiceType> {
        self.state.lock().consumers.keys().copied().collect()
    }

    /// Registers `consumer` for `ty` locally and forwards interest to the broker.
    pub fn register(&self, ty: ServiceType, consumer: Consumer) -> Result<(), BrokerError> {
        let (broker, first, started) = {
            let mut st = self.state.lock();
            if st.lifecycle.is_shutdown() {
                return Err(self.shut_down_error());
            }
            let broker = st.broker.clone().ok_or_else(|| self.shut_down_error())?;
            let started = st.lifecycle.is_started();
            let list = st.consumers.entry(ty).or_default();
            if list.iter().any(|r| r.is(&consumer)) {
                return Ok(());
            }
            let first = list.is_empty();
            list.push(Registration::new(consumer.clone()));
            (broker, first, started)
        };

        if first {
            if let Err(err) = broker.register(ty, self.fanout.clone()) {
                if self.forget(ty, &consumer) {
                    // the broker may hold the fan-out and a proxy that failed to start
                    let _ = broker.unregister_service(ty, &self.fanout);
                }
                return Err(err);
            }
        }
        self.ctx
            .publish(Event::new(EventKind::ConsumerRegistered).with_service(ty.name()));
        if started {
            self.catch_up(&broker, ty)?;
        }
        Ok(())
    }

    /// Removes `consumer` from every local type. Types left without consumers are
    /// unregistered from the broker.
    pub fn unregister(&self, consumer: &Consumer) -> Result<(), BrokerError> {
        let (broker, emptied) = {
            let mut st = self.state.lock();
            let mut emptied = Vec::new();
            let mut removed = false;
            for (ty, list) in st.consumers.iter_mut() {
                let before = list.len();
                list.retain(|r| !r.is(consumer));
                if list.len() != before {
                    removed = true;
                    if list.is_empty() {
                        emptied.push(*ty);
                    }
                }
            }
            if !removed {
                return Ok(());
            }
            for ty in &emptied {
                st.consumers.shift_remove(ty);
            }
            (st.broker.clone(), emptied)
        };

        self.ctx.publish(Event::new(EventKind::ConsumerUnregistered));
        let Some(broker) = broker else {
            return Ok(());
        };
        let mut first = None;
        for ty in emptied {
            if let Err(err) = broker.unregister_service(ty, &self.fanout) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Drops `consumer` from `ty`. Returns `true` if the type has no local consumer left.
    fn forget(&self, ty: ServiceType, consumer: &Consumer) -> bool {
        let mut st = self.state.lock();
        let emptied = match st.consumers.get_mut(&ty) {
            Some(list) => {
                list.retain(|r| !r.is(consumer));
                list.is_empty()
            }
            None => true,
        };
        if emptied {
            st.consumers.shift_remove(&ty);
        }
        emptied
    }

    /// Offers the broker's current instance of `ty` to every local consumer.
    fn catch_up(&self, broker: &Broker, ty: ServiceType) -> Result<(), BrokerError> {
        broker.resolve_with(ty, |instance| self.dispatch(Some(instance), ty))
    }

    fn shut_down_error(&self) -> BrokerError {
        BrokerError::illegal_state(self.ctx.name(), "scope is shut down")
    }

    fn dispatch(&self, instance: Option<&Instance>, ty: ServiceType) {
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

impl Resolver for Client {
    fn require(&self, ty: ServiceType, consumer: Consumer) -> Result<(), BrokerError> {
        self.register(ty, consumer)
    }

    fn release(&self, consumer: &Consumer) -> Result<(), BrokerError> {
        self.unregister(consumer)
    }
}

impl Scope for Client {
    fn name(&self) -> &str {
        self.ctx.name()
    }

    fn startup(&self) -> Result<(), BrokerError> {
        let broker = {
            let st = self.state.lock();
            if st.lifecycle.is_shutdown() {
                return Err(self.shut_down_error());
            }
            if st.lifecycle.is_started() {
                return Ok(());
            }
            st.broker.clone().ok_or_else(|| self.shut_down_error())?
        };
        if broker.is_shutdown() {
            return Err(BrokerError::illegal_state(
                self.ctx.name(),
                format!("broker {} is shut down", broker.name()),
            ));
        }

        let broker_started = broker.startup();

        let types: Vec<ServiceType> = {
            let mut st = self.state.lock();
            if !st.lifecycle.start() {
                return broker_started;
            }
            st.consumers.keys().copied().collect()
        };
        self.ctx.publish(Event::new(EventKind::ScopeStarted));

        let mut first = broker_started.err();
        for ty in types {
            if let Err(err) = self.catch_up(&broker, ty) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn shutdown(&self) -> Result<(), BrokerError> {
        let broker = {
            let mut st = self.state.lock();
            if !st.lifecycle.stop() {
                return Ok(());
            }
            st.consumers.clear();
            st.broker.take()
        };
        self.ctx.publish(Event::new(EventKind::ScopeShutdown));
        match broker {
            Some(broker) => broker.unregister(&self.fanout),
            None => Ok(()),
        }
    }

    fn is_startup(&self) -> bool {
        self.state.lock().lifecycle.is_started()
    }

    fn is_shutdown(&self) -> bool {
        self.state.lock().lifecycle.is_shutdown()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("Client")
            .field("name", &self.ctx.name())
            .field("lifecycle", &st.lifecycle)
            .field("services", &st.consumers.keys().collect::<Vec<_>>())
            .finish()
    }
}
