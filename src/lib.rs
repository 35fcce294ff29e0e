//! # lazylink
//!
//! **lazylink** is a lazy, lifecycle-scoped dependency broker for long-lived,
//! possibly out-of-process services.
//!
//! Consumers declare which service they need by type. The broker builds a proxy for
//! that type through a registry of providers, connects it when the owning scope starts,
//! and hands the live instance to every interested consumer: synchronously when it is
//! already available, later when the connection comes up. Connections that drop are
//! reconnected automatically; connections nobody needs any more are torn down.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Client A   │   │   Client B   │   │   Consumers  │
//!     │ (unit scope) │   │ (unit scope) │   │  of the root │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ one fan-out      │ one fan-out      │
//!            ▼ per type         ▼ per type         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Broker (root scope)                                              │
//! │  - {type → proxy}     built lazily through the Registry           │
//! │  - {type → consumers} fan-out target of every proxy               │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Connection  │   │  Connection  │   │  LocalProxy  │
//!     │    Proxy     │   │    Proxy     │   │ (in-process) │
//!     └┬─────────────┘   └┬─────────────┘   └──────────────┘
//!      │ Connector /      │
//!      │ Binder           │   Publishes events:
//!      ▼                  ▼   ConnectionMade, ConnectionLost, RetryScheduled, ...
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                    (capacity: Config::bus_capacity)               │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │        (in Hub)        │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                      worker1   worker2   workerN
//! ```
//!
//! ### Connection lifecycle
//! ```text
//! Broker::startup ──► proxy.startup ──► Connection::make
//!
//! Idle ──make──► Connecting ──link.connected(raw)──► Connected
//!   ▲                │                                  │
//!   │   connect error / link.failed                     │ link.disconnected
//!   ├────────────────┘                                  ▼
//!   │                                     Idle + retry after retry.next(losses)
//!   └────────────── reset (cancels any pending retry) ◄─┘
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Scopes**        | Root broker and delegated clients with sticky shutdown.      | [`Broker`], [`Client`], [`Scope`]          |
//! | **Resolution**    | Declare interest by type, receive the live instance.         | [`Resolver`], [`Consumer`], [`ServiceType`]|
//! | **Providers**     | Build proxies for a set of service types.                    | [`Provider`], [`ProviderFn`], [`Registry`] |
//! | **Connections**   | State machine with automatic reconnect.                      | [`Connection`], [`Connector`], [`Binder`]  |
//! | **Proxies**       | Uniform accessor + lifecycle over any service.               | [`ServiceProxy`], [`ConnectionProxy`], [`LocalProxy`] |
//! | **Subscriber API**| Hook into scope and connection events.                       | [`Subscribe`], [`SubscriberSet`]           |
//! | **Errors**        | Typed errors for brokers and collaborators.                  | [`BrokerError`], [`ConnectorError`]        |
//! | **Configuration** | Reconnect policy and event bus sizing.                       | [`Config`], [`BackoffPolicy`]              |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use lazylink::{
//!     Config, ConnectionLink, ConnectionProxy, Connector, ConnectorError, Hub, ProviderFn,
//!     Scope, ScopeKey, ServiceType,
//! };
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String { "hello".into() }
//! }
//!
//! // Manual-style connector that "connects" immediately.
//! struct GreeterConnector;
//! impl Connector for GreeterConnector {
//!     type Service = dyn Greeter;
//!
//!     fn connect(&self, link: ConnectionLink) -> Result<(), ConnectorError> {
//!         let svc: Arc<dyn Greeter> = Arc::new(English);
//!         link.connected_with(svc);
//!         Ok(())
//!     }
//!
//!     fn disconnect(&self, _link: &ConnectionLink) -> Result<(), ConnectorError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Hub::builder(Config::default()).build()?;
//!     hub.use_provider(ProviderFn::arc([ServiceType::of::<dyn Greeter>()], |_ty, ctx| {
//!         Ok(ConnectionProxy::arc(GreeterConnector, ctx))
//!     }));
//!
//!     let unit = hub.startup(&ScopeKey::unit("main"))?;
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     let tx = std::sync::Mutex::new(Some(tx));
//!     let _consumer = unit.require_service::<dyn Greeter, _>(move |greeter, _ty| {
//!         if let (Some(g), Some(tx)) = (greeter, tx.lock().unwrap().take()) {
//!             let _ = tx.send(g.greet());
//!         }
//!     })?;
//!
//!     assert_eq!(rx.await?, "hello");
//!     hub.close().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod connection;
mod core;
mod error;
mod events;
mod policies;
mod registry;
mod scope;
mod service;
mod subscribers;

#[cfg(test)]
mod test_support;

// ---- Public re-exports ----

pub use config::Config;
pub use connection::{
    Binder, ConnectionCallback, Connection, ConnectionLink, ConnectionProxy, Connector, Phase,
    RawHandle, Target,
};
pub use core::{Hub, HubBuilder, ScopeKey};
pub use error::{BrokerError, ConnectorError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use registry::{Provider, ProviderFn, ProviderRef, Registry};
pub use scope::{Broker, Client, Context, Resolver, Scope, ScopeRef};
pub use service::{Consumer, Instance, LocalProxy, ProxyRef, ServiceProxy, ServiceType};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
