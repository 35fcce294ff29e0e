//! Error types used by the broker runtime and its collaborators.
//!
//! This module defines two error enums:
//!
//! - [`BrokerError`]: errors surfaced by scopes, proxies, the registry and connections.
//! - [`ConnectorError`]: errors reported by connector/binder collaborators.
//!
//! Both provide `as_label` for logs/metrics. Transient connection loss is **not** an
//! error: it is reported to consumers as an absent instance and retried automatically.

use thiserror::Error;

/// # Errors produced by the broker runtime.
///
/// Every variant is surfaced synchronously from the call that caused it;
/// asynchronous connector outcomes are converted into events instead.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// A required argument or collaborator is missing or malformed at construction time.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: String,
    },

    /// The operation is not permitted in the current lifecycle state.
    #[error("illegal state in {scope}: {reason}")]
    IllegalState {
        /// Name of the scope or proxy that rejected the call.
        scope: String,
        /// Why the call was rejected.
        reason: String,
    },

    /// No installed provider can build a proxy for the requested service type.
    #[error("no provider can build service {service}")]
    ServiceNotFound {
        /// Type name of the requested service.
        service: &'static str,
    },

    /// The connector could not start a connection.
    #[error("connection to {service} failed: {reason}")]
    ConnectionFailed {
        /// Type name of the service being connected.
        service: &'static str,
        /// Collaborator-provided reason.
        reason: String,
    },

    /// The connector could not tear down a connection; the controller state was restored.
    #[error("disconnect from {service} failed: {reason}")]
    DisconnectFailed {
        /// Type name of the service being disconnected.
        service: &'static str,
        /// Collaborator-provided reason.
        reason: String,
    },
}

impl BrokerError {
    /// Shorthand for [`BrokerError::IllegalState`].
    pub(crate) fn illegal_state(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        BrokerError::IllegalState {
            scope: scope.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`BrokerError::InvalidArgument`].
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        BrokerError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use lazylink::BrokerError;
    ///
    /// let err = BrokerError::ServiceNotFound { service: "Echo" };
    /// assert_eq!(err.as_label(), "service_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BrokerError::InvalidArgument { .. } => "invalid_argument",
            BrokerError::IllegalState { .. } => "illegal_state",
            BrokerError::ServiceNotFound { .. } => "service_not_found",
            BrokerError::ConnectionFailed { .. } => "connection_failed",
            BrokerError::DisconnectFailed { .. } => "disconnect_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BrokerError::InvalidArgument { reason } => format!("invalid argument: {reason}"),
            BrokerError::IllegalState { scope, reason } => format!("{scope}: {reason}"),
            BrokerError::ServiceNotFound { service } => format!("not provided: {service}"),
            BrokerError::ConnectionFailed { service, reason } => {
                format!("connect {service}: {reason}")
            }
            BrokerError::DisconnectFailed { service, reason } => {
                format!("disconnect {service}: {reason}")
            }
        }
    }

    /// Indicates a configuration/programming error rather than a runtime condition.
    ///
    /// Callers should abort the operation instead of retrying on these.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BrokerError::InvalidArgument { .. } | BrokerError::ServiceNotFound { .. }
        )
    }
}

/// # Errors reported by connection collaborators.
///
/// Returned from [`Connector`](crate::Connector) and [`Binder`](crate::Binder)
/// implementations; the controller converts them into [`BrokerError`] values.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// The declarative target could not be resolved to a live endpoint.
    #[error("target {target} can not be bound")]
    TargetNotFound {
        /// The endpoint that was requested.
        target: String,
    },

    /// The connector does not implement the requested connection style.
    #[error("{what} is not implemented by this connector")]
    Unsupported {
        /// Which operation is missing.
        what: &'static str,
    },

    /// A declarative target was supplied but the context carries no binder.
    #[error("no binder installed in context")]
    NoBinder,

    /// The remote side refused the request.
    #[error("refused: {reason}")]
    Refused {
        /// Collaborator-provided reason.
        reason: String,
    },

    /// Any other collaborator failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConnectorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectorError::TargetNotFound { .. } => "target_not_found",
            ConnectorError::Unsupported { .. } => "unsupported",
            ConnectorError::NoBinder => "no_binder",
            ConnectorError::Refused { .. } => "refused",
            ConnectorError::Other(_) => "other",
        }
    }
}
