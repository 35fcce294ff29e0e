//! # Type registry - maps a service type to the provider that can build it.
//!
//! [`Registry`] holds installed providers in insertion order and resolves a
//! [`ServiceType`] by scanning them, first match wins.
//!
//! ## Rules
//! - `use_provider` is idempotent per provider instance (pointer identity).
//! - `contains`/`create` short-circuit on the first provider that reports the type.
//! - `create` on an unknown type fails with [`BrokerError::ServiceNotFound`]; callers
//!   treat this as a configuration error and abort the registration.
//! - Providers are called with no registry lock held.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::BrokerError;
use crate::registry::provider::ProviderRef;
use crate::scope::Context;
use crate::service::{ProxyRef, ServiceType};

/// Ordered set of installed providers.
#[derive(Default)]
pub struct Registry {
    providers: RwLock<Vec<ProviderRef>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Installs `provider`. Returns `false` if this exact instance was already installed.
    pub fn use_provider(&self, provider: ProviderRef) -> bool {
        let mut providers = self.providers.write();
        if providers.iter().any(|p| Arc::ptr_eq(p, &provider)) {
            return false;
        }
        providers.push(provider);
        true
    }

    /// Number of installed providers.
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Returns `true` if no provider is installed.
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// Returns `true` if some installed provider can build `ty`.
    pub fn contains(&self, ty: ServiceType) -> bool {
        self.find(ty).is_some()
    }

    /// Builds a proxy for `ty` with the first matching provider.
    pub fn create(&self, ty: ServiceType, ctx: &Context) -> Result<ProxyRef, BrokerError> {
        let provider = self
            .find(ty)
            .ok_or(BrokerError::ServiceNotFound { service: ty.name() })?;
        provider.create(ty, ctx)
    }

    fn find(&self, ty: ServiceType) -> Option<ProviderRef> {
        let providers: Vec<ProviderRef> = self.providers.read().clone();
        providers.into_iter().find(|p| p.contains(ty))
    }
}
