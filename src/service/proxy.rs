//! # Service proxy contract.
//!
//! A [`ServiceProxy`] mediates access to one connectable service: a synchronous
//! accessor ([`provide`](ServiceProxy::provide)), a single asynchronous consumer
//! slot ([`async_provide`](ServiceProxy::async_provide)) and a startup/shutdown
//! lifecycle.
//!
//! ## Rules
//! - `provide()` never blocks and never triggers a connection attempt.
//! - At most one async consumer is registered; a new one silently replaces the old.
//! - The async consumer receives `(Some(instance), type)` when the service becomes live
//!   and `(None, type)` when it goes away (deliberate reset or unexpected drop).
//! - `startup()` is idempotent; `shutdown()` is idempotent and terminal. Proxies in
//!   this crate reject `startup()` after `shutdown()` with
//!   [`BrokerError::IllegalState`].
//!
//! Implementations: [`ConnectionProxy`](crate::ConnectionProxy) (over a
//! [`Connection`](crate::Connection)) and [`LocalProxy`](crate::LocalProxy)
//! (an already-live, in-process service).

use std::sync::Arc;

use crate::error::BrokerError;
use crate::service::consumer::Consumer;
use crate::service::token::{Instance, ServiceType};

/// Uniform lifecycle + accessor abstraction over any connectable service.
pub trait ServiceProxy: Send + Sync + 'static {
    /// The contract this proxy serves.
    fn service_type(&self) -> ServiceType;

    /// Returns the current instance, if live.
    fn provide(&self) -> Option<Instance>;

    /// Replaces the async consumer slot (`None` clears it).
    fn async_provide(&self, consumer: Option<Consumer>);

    /// Returns `true` once started and until shut down.
    fn is_startup(&self) -> bool;

    /// Starts the proxy (triggers a connection attempt where applicable).
    fn startup(&self) -> Result<(), BrokerError>;

    /// Returns `true` once shut down (terminal).
    fn is_shutdown(&self) -> bool;

    /// Shuts the proxy down (terminal).
    fn shutdown(&self) -> Result<(), BrokerError>;
}

/// Shared handle to a proxy.
pub type ProxyRef = Arc<dyn ServiceProxy>;
