//! Runtime core: the hub that wires providers, scopes and observers together.
//!
//! The public API from this module is [`Hub`], built with [`HubBuilder`], and the
//! [`ScopeKey`] that names the scopes it manages.
//!
//! Internal modules:
//! - [`hub`]: scope table, root broker, subscriber listener and shutdown;
//! - [`builder`]: configuration, runtime and collaborator wiring.

mod builder;
mod hub;

pub use builder::HubBuilder;
pub use hub::{Hub, ScopeKey};
