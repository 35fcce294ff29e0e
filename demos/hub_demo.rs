//! # Example: Hub with a flaky declarative service
//!
//! Demonstrates:
//! - An in-memory [`Binder`] that "binds" endpoints after a short delay
//! - A declarative connector for a `Clock` service
//! - A unit scope consuming the service and observing a reconnect
//! - The built-in [`LogWriter`] subscriber printing every event
//!
//! Run with:
//! ```bash
//! cargo run --example hub_demo --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use lazylink::{
    BackoffPolicy, Binder, Config, ConnectionLink, ConnectionProxy, Connector, ConnectorError,
    Hub, LogWriter, ProviderFn, Resolver, ScopeKey, ServiceType, Subscribe, Target,
};

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct Ticker(AtomicU64);

impl Clock for Ticker {
    fn now(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Binds endpoints in-process; keeps the live links so the demo can break them.
#[derive(Default)]
struct MemoryBinder {
    live: Mutex<Vec<ConnectionLink>>,
}

impl MemoryBinder {
    fn break_all(&self) {
        for link in self.live.lock().drain(..) {
            link.disconnected();
        }
    }
}

impl Binder for MemoryBinder {
    fn bind(&self, target: &Target, link: ConnectionLink) -> Result<bool, ConnectorError> {
        if target.endpoint() != "clock" {
            return Ok(false);
        }
        self.live.lock().push(link.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let clock: Arc<dyn Clock> = Arc::new(Ticker(AtomicU64::new(0)));
            link.connected_with(clock);
        });
        Ok(true)
    }

    fn unbind(&self, _target: &Target, link: &ConnectionLink) -> Result<(), ConnectorError> {
        self.live.lock().retain(|l| l.epoch() != link.epoch());
        Ok(())
    }
}

struct ClockConnector;

impl Connector for ClockConnector {
    type Service = dyn Clock;

    fn target(&self) -> Option<Target> {
        Some(Target::new("clock"))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = Config {
        retry: BackoffPolicy::constant(Duration::from_millis(300)),
        ..Config::default()
    };

    let binder = Arc::new(MemoryBinder::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let hub = Hub::builder(cfg)
        .with_subscribers(subs)
        .with_binder(binder.clone())
        .with_provider(ProviderFn::arc(
            [ServiceType::of::<dyn Clock>()],
            |_ty, ctx| Ok(ConnectionProxy::arc(ClockConnector, ctx)),
        ))
        .build()?;

    let unit = hub.startup(&ScopeKey::unit("dashboard"))?;
    let consumer = unit.require_service::<dyn Clock, _>(|clock, _ty| match clock {
        Some(c) => println!("[dashboard] clock available, tick={}", c.now()),
        None => println!("[dashboard] clock gone"),
    })?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("[demo] breaking the connection");
    binder.break_all();
    tokio::time::sleep(Duration::from_millis(600)).await;

    println!("[demo] releasing the consumer");
    unit.release(&consumer)?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    hub.close().await?;
    Ok(())
}
