//! # Provider abstraction.
//!
//! A [`Provider`] is a factory that builds [`ServiceProxy`](crate::ServiceProxy)
//! instances for a known set of service types. Providers are installed into a
//! [`Registry`](crate::Registry) and consulted in insertion order.
//!
//! ## Rules
//! - `contains` must be cheap and side-effect free (the registry may call it often).
//! - `create` is only called for types the provider reported via `contains`.
//! - A fresh proxy is returned per call; brokers own what they get back.

use std::sync::Arc;

use crate::error::BrokerError;
use crate::scope::Context;
use crate::service::{ProxyRef, ServiceType};

/// Factory of service proxies.
pub trait Provider: Send + Sync + 'static {
    /// Returns `true` if this provider can build a proxy for `ty`.
    fn contains(&self, ty: ServiceType) -> bool;

    /// Builds a new proxy for `ty` owned by the scope described by `ctx`.
    fn create(&self, ty: ServiceType, ctx: &Context) -> Result<ProxyRef, BrokerError>;
}

/// Shared handle to a provider.
pub type ProviderRef = Arc<dyn Provider>;
