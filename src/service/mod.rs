//! # Service vocabulary.
//!
//! - [`ServiceType`] / [`Instance`] - identity token and type-erased live service
//! - [`Consumer`] - resolution callback with pointer identity
//! - [`ServiceProxy`] / [`ProxyRef`] - the proxy contract every provider produces
//! - [`LocalProxy`] - proxy over an already-live, in-process service
//! - `Lifecycle` - started/shutdown flags shared by scopes and proxies

mod consumer;
mod lifecycle;
mod local;
mod proxy;
mod token;

pub use consumer::Consumer;
pub(crate) use lifecycle::Lifecycle;
pub use local::LocalProxy;
pub use proxy::{ProxyRef, ServiceProxy};
pub use token::{Instance, ServiceType};
