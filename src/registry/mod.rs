//! # Provider registry.
//!
//! - [`Provider`] - factory trait producing proxies for a set of service types
//! - [`ProviderFn`] - closure-backed provider
//! - [`Registry`] - ordered, first-match provider lookup

mod provider;
mod provider_fn;
#[allow(clippy::module_inception)]
mod registry;

pub use provider::{Provider, ProviderRef};
pub use provider_fn::ProviderFn;
pub use registry::Registry;
