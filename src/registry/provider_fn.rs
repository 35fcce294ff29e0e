//! # Function-backed provider (`ProviderFn`)
//!
//! [`ProviderFn`] pairs a declared set of service types with a closure
//! `F: Fn(ServiceType, &Context) -> Result<ProxyRef, BrokerError>` that builds a
//! fresh proxy per call.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lazylink::{LocalProxy, ProviderFn, Provider, ServiceType};
//!
//! struct Clock;
//!
//! let p = ProviderFn::arc([ServiceType::of::<Clock>()], |_ty, _ctx| {
//!     Ok(LocalProxy::arc(Arc::new(Clock)))
//! });
//! assert!(p.contains(ServiceType::of::<Clock>()));
//! assert!(!p.contains(ServiceType::of::<String>()));
//! ```

use std::sync::Arc;

use crate::error::BrokerError;
use crate::registry::provider::Provider;
use crate::scope::Context;
use crate::service::{ProxyRef, ServiceType};

/// Provider backed by a closure.
pub struct ProviderFn<F> {
    types: Vec<ServiceType>,
    f: F,
}

impl<F> ProviderFn<F>
where
    F: Fn(ServiceType, &Context) -> Result<ProxyRef, BrokerError> + Send + Sync + 'static,
{
    /// Creates a provider serving exactly `types`.
    ///
    /// Prefer [`ProviderFn::arc`] when you immediately need a shared handle.
    pub fn new(types: impl IntoIterator<Item = ServiceType>, f: F) -> Self {
        let mut list: Vec<ServiceType> = Vec::new();
        for ty in types {
            if !list.contains(&ty) {
                list.push(ty);
            }
        }
        Self { types: list, f }
    }

    /// Creates the provider and returns it as `Arc<Self>`.
    pub fn arc(types: impl IntoIterator<Item = ServiceType>, f: F) -> Arc<Self> {
        Arc::new(Self::new(types, f))
    }

    /// Declared service types, in declaration order.
    pub fn types(&self) -> &[ServiceType] {
        &self.types
    }
}

impl<F> Provider for ProviderFn<F>
where
    F: Fn(ServiceType, &Context) -> Result<ProxyRef, BrokerError> + Send + Sync + 'static,
{
    fn contains(&self, ty: ServiceType) -> bool {
        self.types.contains(&ty)
    }

    fn create(&self, ty: ServiceType, ctx: &Context) -> Result<ProxyRef, BrokerError> {
        if !self.contains(ty) {
            return Err(BrokerError::ServiceNotFound { service: ty.name() });
        }
        (self.f)(ty, ctx)
    }
}
