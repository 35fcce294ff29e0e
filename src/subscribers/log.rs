//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [proxy-created] scope="app" service="demo::Echo"
//! [connecting] scope="app" service="demo::Echo" attempt=0
//! [connected] scope="app" service="demo::Echo"
//! [lost] scope="app" service="demo::Echo"
//! [retry] scope="app" service="demo::Echo" delay_ms=1000 attempt=0
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let scope = e.scope.as_deref().unwrap_or("-");
        let service = e.service.unwrap_or("-");
        match e.kind {
            EventKind::ScopeStarted => println!("[scope-started] scope={scope:?}"),
            EventKind::ScopeShutdown => println!("[scope-shutdown] scope={scope:?}"),
            EventKind::ConsumerRegistered => {
                println!("[registered] scope={scope:?} service={service:?}");
            }
            EventKind::ConsumerUnregistered => {
                println!("[unregistered] scope={scope:?} service={service:?}");
            }
            EventKind::ProxyCreated => {
                println!("[proxy-created] scope={scope:?} service={service:?}");
            }
            EventKind::ProxyStarted => {
                println!("[proxy-started] scope={scope:?} service={service:?}");
            }
            EventKind::ProxyReleased => {
                println!(
                    "[proxy-released] scope={scope:?} service={service:?} err={:?}",
                    e.reason
                );
            }
            EventKind::ConnectionStarting => {
                println!(
                    "[connecting] scope={scope:?} service={service:?} attempt={:?}",
                    e.attempt
                );
            }
            EventKind::ConnectionMade => {
                println!("[connected] scope={scope:?} service={service:?}");
            }
            EventKind::ConnectionLost => println!("[lost] scope={scope:?} service={service:?}"),
            EventKind::ConnectionReset => println!("[reset] scope={scope:?} service={service:?}"),
            EventKind::ConnectionFailed => {
                println!(
                    "[connect-failed] scope={scope:?} service={service:?} err={:?}",
                    e.reason
                );
            }
            EventKind::DisconnectFailed => {
                println!(
                    "[disconnect-failed] scope={scope:?} service={service:?} err={:?}",
                    e.reason
                );
            }
            EventKind::RetryScheduled => {
                println!(
                    "[retry] scope={scope:?} service={service:?} delay_ms={:?} attempt={:?}",
                    e.delay_ms, e.attempt
                );
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={scope:?} reason={:?}", e.reason);
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={scope} info={}",
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
