//! # Runtime events emitted by scopes, proxies and connections.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Scope events**: broker/client lifecycle transitions
//! - **Registration events**: consumers and proxies entering/leaving a broker
//! - **Connection events**: the connection state machine and its retry scheduling
//! - **Subscriber events**: delivery problems inside the [`SubscriberSet`](crate::SubscriberSet)
//!
//! The [`Event`] struct carries metadata such as timestamps, scope and service names,
//! reasons and retry delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lazylink::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_scope("app")
//!     .with_service("demo::Echo")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_secs(1));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.service, Some("demo::Echo"));
//! assert_eq!(ev.delay_ms, Some(1000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Scope events ===
    /// Scope transitioned to started.
    ///
    /// Sets:
    /// - `scope`: scope name
    ScopeStarted,

    /// Scope transitioned to its terminal shut-down state.
    ///
    /// Sets:
    /// - `scope`: scope name
    ScopeShutdown,

    // === Registration events ===
    /// A consumer was added to a broker's list for a service type.
    ///
    /// Sets:
    /// - `scope`: broker name
    /// - `service`: service type name
    ConsumerRegistered,

    /// A consumer was removed from a broker's list for a service type.
    ///
    /// Sets:
    /// - `scope`: broker name
    /// - `service`: service type name
    ConsumerUnregistered,

    /// A proxy was built by the registry and stored in a broker.
    ///
    /// Sets:
    /// - `scope`: broker name
    /// - `service`: service type name
    ProxyCreated,

    /// A broker started a proxy.
    ///
    /// Sets:
    /// - `scope`: broker name
    /// - `service`: service type name
    ProxyStarted,

    /// A proxy was torn down and dropped from its broker.
    ///
    /// Sets:
    /// - `scope`: broker name
    /// - `service`: service type name
    /// - `reason`: teardown error, if the proxy failed to shut down
    ProxyReleased,

    // === Connection events ===
    /// A connect attempt was issued to the collaborator.
    ///
    /// Sets:
    /// - `scope`, `service`
    /// - `attempt`: consecutive retry number (0 for a first connect)
    ConnectionStarting,

    /// The collaborator signalled a live connection.
    ///
    /// Sets:
    /// - `scope`, `service`
    ConnectionMade,

    /// An established connection dropped unexpectedly.
    ///
    /// Sets:
    /// - `scope`, `service`
    ConnectionLost,

    /// A connection was deliberately torn down.
    ///
    /// Sets:
    /// - `scope`, `service`
    ConnectionReset,

    /// A connect attempt failed (synchronously or via the collaborator).
    ///
    /// Sets:
    /// - `scope`, `service`
    /// - `reason`: failure message
    ConnectionFailed,

    /// A teardown failed; the controller kept its previous state.
    ///
    /// Sets:
    /// - `scope`, `service`
    /// - `reason`: failure message
    DisconnectFailed,

    /// Automatic reconnect scheduled after a lost connection.
    ///
    /// Sets:
    /// - `scope`, `service`
    /// - `attempt`: consecutive retry number (0-based)
    /// - `delay_ms`: delay before the retry (ms)
    RetryScheduled,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `scope`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `scope`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Scope (or subscriber) name, if applicable.
    pub scope: Option<Arc<str>>,
    /// Service type name, if applicable.
    pub service: Option<&'static str>,
    /// Retry attempt number.
    pub attempt: Option<u32>,
    /// Retry delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            scope: None,
            service: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a scope name.
    #[inline]
    pub fn with_scope(mut self, scope: impl Into<Arc<str>>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Attaches a service type name.
    #[inline]
    pub fn with_service(mut self, service: &'static str) -> Self {
        self.service = Some(service);
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_scope(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_scope(subscriber)
            .with_reason(info)
    }

    /// Returns `true` for events describing the connection state machine.
    #[inline]
    pub fn is_connection_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ConnectionStarting
                | EventKind::ConnectionMade
                | EventKind::ConnectionLost
                | EventKind::ConnectionReset
                | EventKind::ConnectionFailed
                | EventKind::DisconnectFailed
                | EventKind::RetryScheduled
        )
    }
}
