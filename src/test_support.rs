//! Shared fakes for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::connection::{Binder, ConnectionLink, Connector, Target};
use crate::error::{BrokerError, ConnectorError};
use crate::events::Bus;
use crate::registry::Provider;
use crate::scope::Context;
use crate::service::{Consumer, Instance, Lifecycle, ProxyRef, ServiceProxy, ServiceType};

/// Service used throughout the tests.
#[derive(Debug)]
pub(crate) struct Echo;

impl Echo {
    pub(crate) fn ping(&self) -> &'static str {
        "pong"
    }
}

/// Lets spawned workers drain their queues.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Waits (real time) until `hits` is non-zero, then a little longer so a
/// duplicate delivery would be counted too.
pub(crate) async fn wait_for(hits: &AtomicUsize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while hits.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("delivered in time");
    tokio::time::sleep(Duration::from_millis(5)).await;
}

pub(crate) fn context(name: &str) -> Context {
    Context::new(name, Bus::new(256), Handle::current())
}

pub(crate) fn context_with_binder(name: &str, binder: Arc<ScriptedBinder>) -> Context {
    context(name).with_binder(binder)
}

/// Binder that records links and lets the test drive them.
#[derive(Default)]
pub(crate) struct ScriptedBinder {
    links: Mutex<Vec<ConnectionLink>>,
    missing: AtomicBool,
    refuse_bind: AtomicBool,
    refuse_unbind: AtomicBool,
    pub(crate) binds: AtomicUsize,
    pub(crate) unbinds: AtomicUsize,
}

impl ScriptedBinder {
    pub(crate) fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn last_link(&self) -> Option<ConnectionLink> {
        self.links.lock().last().cloned()
    }

    pub(crate) fn set_missing(&self, on: bool) {
        self.missing.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_bind(&self, on: bool) {
        self.refuse_bind.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_unbind(&self, on: bool) {
        self.refuse_unbind.store(on, Ordering::SeqCst);
    }
}

impl Binder for ScriptedBinder {
    fn bind(&self, _target: &Target, link: ConnectionLink) -> Result<bool, ConnectorError> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        if self.refuse_bind.load(Ordering::SeqCst) {
            return Err(ConnectorError::Refused {
                reason: "bind refused".into(),
            });
        }
        if self.missing.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.links.lock().push(link);
        Ok(true)
    }

    fn unbind(&self, _target: &Target, _link: &ConnectionLink) -> Result<(), ConnectorError> {
        self.unbinds.fetch_add(1, Ordering::SeqCst);
        if self.refuse_unbind.load(Ordering::SeqCst) {
            return Err(ConnectorError::Refused {
                reason: "unbind refused".into(),
            });
        }
        Ok(())
    }
}

/// Binder that connects from inside `bind`, racing the caller on a multi-thread runtime.
pub(crate) struct EagerBinder;

impl Binder for EagerBinder {
    fn bind(&self, _target: &Target, link: ConnectionLink) -> Result<bool, ConnectorError> {
        link.connected_with(Arc::new(Echo));
        Ok(true)
    }

    fn unbind(&self, _target: &Target, _link: &ConnectionLink) -> Result<(), ConnectorError> {
        Ok(())
    }
}

/// Connector for [`Echo`], declarative or manual.
#[derive(Default)]
pub(crate) struct EchoConnector {
    target: Option<Target>,
    pub(crate) manual_links: Mutex<Vec<ConnectionLink>>,
    pub(crate) made: AtomicUsize,
    pub(crate) resets: AtomicUsize,
}

impl EchoConnector {
    pub(crate) fn declarative(endpoint: &str) -> Self {
        Self {
            target: Some(Target::new(endpoint)),
            ..Self::default()
        }
    }

    pub(crate) fn manual() -> Self {
        Self::default()
    }

    pub(crate) fn last_manual_link(&self) -> Option<ConnectionLink> {
        self.manual_links.lock().last().cloned()
    }
}

impl Connector for EchoConnector {
    type Service = Echo;

    fn target(&self) -> Option<Target> {
        self.target.clone()
    }

    fn connect(&self, link: ConnectionLink) -> Result<(), ConnectorError> {
        self.manual_links.lock().push(link);
        Ok(())
    }

    fn on_connection_made(&self, _service: &Arc<Echo>) {
        self.made.fetch_add(1, Ordering::SeqCst);
    }

    fn on_connection_reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Proxy that records every call made on it.
pub(crate) struct FakeProxy {
    ty: ServiceType,
    live: Mutex<Option<Instance>>,
    consumer: Mutex<Option<Consumer>>,
    lifecycle: Mutex<Lifecycle>,
    pub(crate) startups: AtomicUsize,
    pub(crate) shutdowns: AtomicUsize,
    pub(crate) slot_sets: AtomicUsize,
    pub(crate) slot_clears: AtomicUsize,
}

impl FakeProxy {
    pub(crate) fn new(ty: ServiceType) -> Arc<Self> {
        Arc::new(Self {
            ty,
            live: Mutex::new(None),
            consumer: Mutex::new(None),
            lifecycle: Mutex::new(Lifecycle::new()),
            startups: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            slot_sets: AtomicUsize::new(0),
            slot_clears: AtomicUsize::new(0),
        })
    }

    /// Simulates the connection becoming live.
    pub(crate) fn connect(&self) {
        let instance = Instance::new(Arc::new(Echo));
        *self.live.lock() = Some(instance.clone());
        let consumer = self.consumer.lock().clone();
        if let Some(c) = consumer {
            c.accept(Some(&instance), self.ty);
        }
    }

    /// Simulates the connection dropping.
    pub(crate) fn drop_connection(&self) {
        *self.live.lock() = None;
        let consumer = self.consumer.lock().clone();
        if let Some(c) = consumer {
            c.accept(None, self.ty);
        }
    }

    pub(crate) fn has_consumer(&self) -> bool {
        self.consumer.lock().is_some()
    }
}

impl ServiceProxy for FakeProxy {
    fn service_type(&self) -> ServiceType {
        self.ty
    }

    fn provide(&self) -> Option<Instance> {
        self.live.lock().clone()
    }

    fn async_provide(&self, consumer: Option<Consumer>) {
        let counter = if consumer.is_some() {
            &self.slot_sets
        } else {
            &self.slot_clears
        };
        counter.fetch_add(1, Ordering::SeqCst);
        *self.consumer.lock() = consumer;
    }

    fn is_startup(&self) -> bool {
        self.lifecycle.lock().is_started()
    }

    fn startup(&self) -> Result<(), BrokerError> {
        self.startups.fetch_add(1, Ordering::SeqCst);
        let mut lc = self.lifecycle.lock();
        if lc.is_shutdown() {
            return Err(BrokerError::illegal_state(self.ty.name(), "proxy is shut down"));
        }
        lc.start();
        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.lifecycle.lock().is_shutdown()
    }

    fn shutdown(&self) -> Result<(), BrokerError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.lifecycle.lock().stop();
        Ok(())
    }
}

/// Provider of [`FakeProxy`] for one type, counting registry traffic.
pub(crate) struct CountingProvider {
    ty: ServiceType,
    pub(crate) contains_calls: AtomicUsize,
    pub(crate) create_calls: AtomicUsize,
    created: Mutex<Vec<Arc<FakeProxy>>>,
}

impl CountingProvider {
    pub(crate) fn arc<T: ?Sized + 'static>() -> Arc<Self> {
        Arc::new(Self {
            ty: ServiceType::of::<T>(),
            contains_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        })
    }

    /// Proxies built so far, oldest first.
    pub(crate) fn created(&self) -> Vec<Arc<FakeProxy>> {
        self.created.lock().clone()
    }

    pub(crate) fn last(&self) -> Option<Arc<FakeProxy>> {
        self.created.lock().last().cloned()
    }

    pub(crate) fn registry_calls(&self) -> usize {
        self.contains_calls.load(Ordering::SeqCst) + self.create_calls.load(Ordering::SeqCst)
    }
}

impl Provider for CountingProvider {
    fn contains(&self, ty: ServiceType) -> bool {
        self.contains_calls.fetch_add(1, Ordering::SeqCst);
        ty == self.ty
    }

    fn create(&self, ty: ServiceType, _ctx: &Context) -> Result<ProxyRef, BrokerError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let proxy = FakeProxy::new(ty);
        self.created.lock().push(proxy.clone());
        Ok(proxy)
    }
}
