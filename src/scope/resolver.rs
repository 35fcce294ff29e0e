//! # Resolution and scope contracts.
//!
//! [`Resolver`] is the consumer-facing seam: declare interest in a service type and
//! get the live instance delivered through a [`Consumer`]. [`Scope`] adds the
//! lifecycle seam a host drives (`startup`/`shutdown`).
//!
//! Delivery is synchronous on the `require` call stack when the scope is started and
//! the service is already live; otherwise the consumer is called later, when the
//! connection comes up.

use std::sync::Arc;

use crate::error::BrokerError;
use crate::service::{Consumer, ServiceType};

/// Registers interest in services.
pub trait Resolver: Send + Sync {
    /// Registers `consumer` for `ty`.
    ///
    /// # Errors
    /// [`BrokerError::IllegalState`] on a shut-down scope,
    /// [`BrokerError::ServiceNotFound`] when no provider serves `ty`.
    fn require(&self, ty: ServiceType, consumer: Consumer) -> Result<(), BrokerError>;

    /// Drops every registration of `consumer`.
    fn release(&self, consumer: &Consumer) -> Result<(), BrokerError>;
}

/// A lifecycle-bound owner of service registrations.
pub trait Scope: Resolver {
    fn name(&self) -> &str;

    /// Starts the scope and catches up every registered consumer.
    ///
    /// Idempotent. Fails with [`BrokerError::IllegalState`] once shut down.
    fn startup(&self) -> Result<(), BrokerError>;

    /// Terminal teardown. Idempotent.
    fn shutdown(&self) -> Result<(), BrokerError>;

    fn is_startup(&self) -> bool;

    fn is_shutdown(&self) -> bool;
}

/// Shared handle to a scope.
pub type ScopeRef = Arc<dyn Scope>;

impl<'a> dyn Scope + 'a {
    /// Registers a typed callback for `T` and returns the consumer handle
    /// (keep it to [`release`](Resolver::release) later).
    ///
    /// ```rust,no_run
    /// # use lazylink::{Scope, BrokerError};
    /// # fn demo(scope: &dyn Scope) -> Result<(), BrokerError> {
    /// struct Clock;
    /// let consumer = scope.require_service::<Clock, _>(|clock, _ty| {
    ///     let _live = clock.is_some();
    /// })?;
    /// scope.release(&consumer)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn require_service<T, F>(&self, f: F) -> Result<Consumer, BrokerError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Option<Arc<T>>, ServiceType) + Send + Sync + 'static,
    {
        let consumer = Consumer::typed::<T, F>(f);
        self.require(ServiceType::of::<T>(), consumer.clone())?;
        Ok(consumer)
    }
}
