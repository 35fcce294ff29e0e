//! # Scopes.
//!
//! - [`Context`] - ambient handle (name, bus, runtime, binder, retry policy)
//! - [`Resolver`] / [`Scope`] - resolution and lifecycle contracts
//! - [`Broker`] - root scope owning one proxy per service type
//! - [`Client`] - delegated scope forwarding to a broker

mod broker;
mod client;
mod context;
mod registration;
mod resolver;

pub use broker::Broker;
pub use client::Client;
pub use context::Context;
pub use resolver::{Resolver, Scope, ScopeRef};
