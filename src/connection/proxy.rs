//! # Connection-backed proxy.
//!
//! [`ConnectionProxy`] adapts a [`Connection`] to the [`ServiceProxy`] contract:
//!
//! - `provide()` returns the cached service while connected.
//! - The async consumer slot is the connection's external callback.
//! - `startup()` issues `make()`; `shutdown()` issues `reset()` and is terminal.
//!
//! A failed `reset()` leaves the proxy running so the caller may try again.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::connector::{ConnectionCallback, Connector};
use crate::connection::controller::Connection;
use crate::error::BrokerError;
use crate::scope::Context;
use crate::service::{Consumer, Instance, Lifecycle, ProxyRef, ServiceProxy, ServiceType};

/// Forwards connection transitions to the proxy's single consumer.
struct ConsumerSlot {
    ty: ServiceType,
    consumer: Mutex<Option<Consumer>>,
}

impl ConsumerSlot {
    fn dispatch(&self, instance: Option<&Instance>) {
        let consumer = self.consumer.lock().clone();
        if let Some(consumer) = consumer {
            consumer.accept(instance, self.ty);
        }
    }
}

impl<S: ?Sized + Send + Sync + 'static> ConnectionCallback<S> for ConsumerSlot {
    fn on_connection_made(&self, service: &Arc<S>) {
        self.dispatch(Some(&Instance::new(service.clone())));
    }

    fn on_connection_reset(&self) {
        self.dispatch(None);
    }
}

/// [`ServiceProxy`] over a [`Connection`].
pub struct ConnectionProxy<C: Connector> {
    conn: Connection<C>,
    slot: Arc<ConsumerSlot>,
    lifecycle: Mutex<Lifecycle>,
}

impl<C: Connector> ConnectionProxy<C> {
    /// Creates an idle proxy for `connector` in the scope described by `ctx`.
    pub fn new(connector: C, ctx: &Context) -> Self {
        let conn = Connection::new(connector, ctx);
        let slot = Arc::new(ConsumerSlot {
            ty: conn.service_type(),
            consumer: Mutex::new(None),
        });
        conn.set_callback(Some(slot.clone()));
        Self {
            conn,
            slot,
            lifecycle: Mutex::new(Lifecycle::new()),
        }
    }

    /// Creates the proxy and returns it as a shared [`ProxyRef`].
    pub fn arc(connector: C, ctx: &Context) -> ProxyRef {
        Arc::new(Self::new(connector, ctx))
    }

    /// The underlying controller.
    pub fn connection(&self) -> &Connection<C> {
        &self.conn
    }
}

impl<C: Connector> ServiceProxy for ConnectionProxy<C> {
    fn service_type(&self) -> ServiceType {
        self.conn.service_type()
    }

    fn provide(&self) -> Option<Instance> {
        self.conn.get().map(Instance::new)
    }

    fn async_provide(&self, consumer: Option<Consumer>) {
        *self.slot.consumer.lock() = consumer;
    }

    fn is_startup(&self) -> bool {
        self.lifecycle.lock().is_started()
    }

    fn startup(&self) -> Result<(), BrokerError> {
        {
            let lc = self.lifecycle.lock();
            if lc.is_shutdown() {
                return Err(BrokerError::illegal_state(
                    self.conn.service_type().name(),
                    "proxy is shut down",
                ));
            }
            if lc.is_started() {
                return Ok(());
            }
        }
        self.conn.make()?;
        self.lifecycle.lock().start();
        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.lifecycle.lock().is_shutdown()
    }

    fn shutdown(&self) -> Result<(), BrokerError> {
        if self.lifecycle.lock().is_shutdown() {
            return Ok(());
        }
        self.conn.reset()?;
        self.lifecycle.lock().stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::connection::controller::Phase;
    use crate::test_support::{Echo, EchoConnector, ScriptedBinder, context_with_binder, settle};

    fn counting_consumer() -> (Consumer, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let some = Arc::new(AtomicUsize::new(0));
        let none = Arc::new(AtomicUsize::new(0));
        let (s, n) = (some.clone(), none.clone());
        let consumer = Consumer::typed::<Echo, _>(move |svc, _| {
            let counter = if svc.is_some() { &s } else { &n };
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (consumer, some, none)
    }

    #[tokio::test]
    async fn consumer_follows_the_connection() {
        let binder = ScriptedBinder::arc();
        let ctx = context_with_binder("root", binder.clone());
        let proxy = ConnectionProxy::new(EchoConnector::declarative("echo"), &ctx);
        let (consumer, some, none) = counting_consumer();
        proxy.async_provide(Some(consumer));

        proxy.startup().expect("startup");
        assert!(proxy.is_startup());
        assert!(proxy.provide().is_none());

        binder.last_link().expect("bound").connected_with(Arc::new(Echo));
        settle().await;
        assert_eq!(some.load(Ordering::SeqCst), 1);
        assert!(proxy.provide().and_then(|i| i.get::<Echo>()).is_some());

        proxy.shutdown().expect("shutdown");
        assert_eq!(none.load(Ordering::SeqCst), 1);
        assert!(proxy.provide().is_none());
        assert!(proxy.is_shutdown());
        assert_eq!(proxy.connection().phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn startup_is_idempotent_and_rejected_after_shutdown() {
        let binder = ScriptedBinder::arc();
        let ctx = context_with_binder("root", binder.clone());
        let proxy = ConnectionProxy::new(EchoConnector::declarative("echo"), &ctx);

        proxy.startup().expect("startup");
        proxy.startup().expect("again");
        assert_eq!(binder.binds.load(Ordering::SeqCst), 1);

        proxy.shutdown().expect("shutdown");
        let err = proxy.startup().expect_err("terminal");
        assert_eq!(err.as_label(), "illegal_state");
        assert_eq!(binder.binds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_reset_keeps_the_proxy_running() {
        let binder = ScriptedBinder::arc();
        let ctx = context_with_binder("root", binder.clone());
        let proxy = ConnectionProxy::new(EchoConnector::declarative("echo"), &ctx);
        proxy.startup().expect("startup");

        binder.fail_unbind(true);
        let err = proxy.shutdown().expect_err("refused");
        assert_eq!(err.as_label(), "disconnect_failed");
        assert!(proxy.is_startup());
        assert!(!proxy.is_shutdown());

        binder.fail_unbind(false);
        proxy.shutdown().expect("shutdown");
        assert!(proxy.is_shutdown());
    }

    #[tokio::test]
    async fn replaced_consumer_is_not_invoked() {
        let binder = ScriptedBinder::arc();
        let ctx = context_with_binder("root", binder.clone());
        let proxy = ConnectionProxy::new(EchoConnector::declarative("echo"), &ctx);
        let (first, first_some, _) = counting_consumer();
        let (second, second_some, _) = counting_consumer();

        proxy.async_provide(Some(first));
        proxy.async_provide(Some(second));
        proxy.startup().expect("startup");
        binder.last_link().expect("bound").connected_with(Arc::new(Echo));
        settle().await;

        assert_eq!(first_some.load(Ordering::SeqCst), 0);
        assert_eq!(second_some.load(Ordering::SeqCst), 1);
    }
}
