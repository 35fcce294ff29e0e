//! # Connection collaborators.
//!
//! The controller never opens a transport itself. It drives two collaborator traits:
//!
//! - [`Connector`]: per-service adapter. Either names a declarative [`Target`]
//!   (handed to the context's [`Binder`]) or performs the connect itself (manual style).
//!   It also converts the raw handle delivered on connect into the typed service.
//! - [`Binder`]: the standard bind primitive shared by all declarative connectors of a
//!   scope, installed through [`Context`](crate::Context).
//!
//! Both report outcomes asynchronously through the [`ConnectionLink`] they are handed.
//!
//! ```text
//! Connection::make ──► Connector::target() ──Some──► Binder::bind(target, link)
//!                                         └─None──► Connector::connect(link)
//! collaborator ──► link.connected(raw) ──► Connector::convert(raw) ──► Arc<Service>
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::connection::link::ConnectionLink;
use crate::error::ConnectorError;

/// Untyped handle delivered by a collaborator on connect.
pub type RawHandle = Arc<dyn Any + Send + Sync>;

/// Declarative endpoint descriptor handed to a [`Binder`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    endpoint: Arc<str>,
}

impl Target {
    /// Creates a target for `endpoint`.
    pub fn new(endpoint: impl Into<Arc<str>>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Endpoint name.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint)
    }
}

/// Standard bind primitive for declarative connectors.
pub trait Binder: Send + Sync + 'static {
    /// Starts binding `target`. `Ok(false)` means the target does not exist.
    ///
    /// The outcome is reported later through `link`.
    fn bind(&self, target: &Target, link: ConnectionLink) -> Result<bool, ConnectorError>;

    /// Tears down the binding previously made with `link`.
    fn unbind(&self, target: &Target, link: &ConnectionLink) -> Result<(), ConnectorError>;
}

/// Per-service connection adapter.
pub trait Connector: Send + Sync + 'static {
    /// Service contract produced by this connector.
    type Service: ?Sized + Send + Sync + 'static;

    /// Declarative target. `None` selects the manual style.
    fn target(&self) -> Option<Target> {
        None
    }

    /// Manual connect. Called only when [`target`](Connector::target) is `None`.
    fn connect(&self, link: ConnectionLink) -> Result<(), ConnectorError> {
        let _ = link;
        Err(ConnectorError::Unsupported {
            what: "manual connect",
        })
    }

    /// Manual disconnect. Called only when [`target`](Connector::target) is `None`.
    fn disconnect(&self, link: &ConnectionLink) -> Result<(), ConnectorError> {
        let _ = link;
        Err(ConnectorError::Unsupported {
            what: "manual disconnect",
        })
    }

    /// Converts the raw handle into the service.
    ///
    /// The default accepts handles posted with
    /// [`ConnectionLink::connected_with`].
    fn convert(&self, raw: RawHandle) -> Option<Arc<Self::Service>> {
        raw.downcast_ref::<Arc<Self::Service>>().cloned()
    }

    /// Called after the connection became live, before the external callback.
    fn on_connection_made(&self, service: &Arc<Self::Service>) {
        let _ = service;
    }

    /// Called after a live connection went away, before the external callback.
    fn on_connection_reset(&self) {}
}

/// Externally registered observer of a connection.
pub trait ConnectionCallback<S: ?Sized>: Send + Sync + 'static {
    /// The connection became live with `service`.
    fn on_connection_made(&self, service: &Arc<S>);

    /// A live connection went away.
    fn on_connection_reset(&self);
}
