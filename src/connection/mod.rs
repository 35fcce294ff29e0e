//! # Connection orchestration.
//!
//! - [`Connector`] / [`Binder`] / [`Target`] - collaborators that open the actual transport
//! - [`ConnectionLink`] - handle collaborators use to report outcomes
//! - [`Connection`] - per-service state machine with automatic reconnect
//! - [`ConnectionProxy`] - [`ServiceProxy`](crate::ServiceProxy) over a `Connection`
//! - `Scheduler` - single pending retry per controller

mod connector;
mod controller;
mod link;
mod proxy;
mod scheduler;

pub use connector::{Binder, ConnectionCallback, Connector, RawHandle, Target};
pub use controller::{Connection, Phase};
pub use link::ConnectionLink;
pub use proxy::ConnectionProxy;
