//! # In-process proxy.
//!
//! [`LocalProxy`] exposes an already-live service through the [`ServiceProxy`]
//! contract, so in-process implementations can be brokered exactly like remote ones.
//!
//! The instance is available from construction until shutdown. Startup does not
//! fire the async consumer (there is no connect transition); a broker catches its
//! consumers up through `provide()`. Shutting down a started proxy fires
//! `(None, type)` to the registered consumer.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::BrokerError;
use crate::service::consumer::Consumer;
use crate::service::lifecycle::Lifecycle;
use crate::service::proxy::{ProxyRef, ServiceProxy};
use crate::service::token::{Instance, ServiceType};

struct LocalState {
    lifecycle: Lifecycle,
    consumer: Option<Consumer>,
}

/// Proxy over a live, in-process service.
pub struct LocalProxy {
    instance: Instance,
    state: Mutex<LocalState>,
}

impl LocalProxy {
    /// Wraps `service`.
    pub fn new<T: ?Sized + Send + Sync + 'static>(service: Arc<T>) -> Self {
        Self {
            instance: Instance::new(service),
            state: Mutex::new(LocalState {
                lifecycle: Lifecycle::new(),
                consumer: None,
            }),
        }
    }

    /// Wraps `service` and returns it as a shared [`ProxyRef`].
    pub fn arc<T: ?Sized + Send + Sync + 'static>(service: Arc<T>) -> ProxyRef {
        Arc::new(Self::new(service))
    }
}

impl ServiceProxy for LocalProxy {
    fn service_type(&self) -> ServiceType {
        self.instance.service_type()
    }

    fn provide(&self) -> Option<Instance> {
        if self.state.lock().lifecycle.is_shutdown() {
            None
        } else {
            Some(self.instance.clone())
        }
    }

    fn async_provide(&self, consumer: Option<Consumer>) {
        self.state.lock().consumer = consumer;
    }

    fn is_startup(&self) -> bool {
        self.state.lock().lifecycle.is_started()
    }

    fn startup(&self) -> Result<(), BrokerError> {
        let mut st = self.state.lock();
        if st.lifecycle.is_shutdown() {
            return Err(BrokerError::illegal_state(
                self.instance.service_type().name(),
                "proxy is shut down",
            ));
        }
        st.lifecycle.start();
        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.state.lock().lifecycle.is_shutdown()
    }

    fn shutdown(&self) -> Result<(), BrokerError> {
        let consumer = {
            let mut st = self.state.lock();
            let was_started = st.lifecycle.is_started();
            if !st.lifecycle.stop() || !was_started {
                return Ok(());
            }
            st.consumer.clone()
        };
        if let Some(consumer) = consumer {
            consumer.accept(None, self.instance.service_type());
        }
        Ok(())
    }
}
