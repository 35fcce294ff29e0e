//! # Connection controller.
//!
//! [`Connection`] owns one connection to one service and runs its state machine:
//!
//! ```text
//!            make()                link.connected(raw)
//!   Idle ───────────────► Connecting ───────────────► Connected
//!    ▲  ▲                   │    │                        │
//!    │  │ connect error /   │    │ reset()                │ reset()
//!    │  └── link.failed() ──┘    ▼                        ▼
//!    │                          Idle ◄────────────────── Idle
//!    │                                                    ▲
//!    └── retry fires (make) ◄── schedule(delay) ◄──── link.disconnected()
//! ```
//!
//! ## Serialization
//! - `make()` and `reset()` run inline on the caller (the same-thread fast path), so
//!   connect and disconnect errors are returned synchronously.
//! - Collaborator signals (connected / disconnected / failed) and fired retries go
//!   through an unbounded queue drained by one worker task per controller.
//! - `make`, `reset`, a connected signal and a newly scheduled retry cancel any
//!   pending retry first; at most one retry is ever outstanding.
//! - Every connect attempt gets a new epoch; signals from older epochs are dropped.
//!
//! ## Fan-out
//! Entering `Connected` calls [`Connector::on_connection_made`] and then the external
//! [`ConnectionCallback`]. Leaving `Connected` calls the matching reset hooks. No
//! controller lock is held across any collaborator call.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::connection::connector::{ConnectionCallback, Connector, RawHandle};
use crate::connection::link::{ConnectionLink, Signal};
use crate::connection::scheduler::Scheduler;
use crate::error::{BrokerError, ConnectorError};
use crate::events::{Event, EventKind};
use crate::scope::Context;
use crate::service::ServiceType;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No connection and no attempt in flight.
    Idle,
    /// A connect attempt was issued; waiting for the collaborator.
    Connecting,
    /// The service is live and cached.
    Connected,
}

type CallbackRef<S> = Arc<dyn ConnectionCallback<S>>;

struct State<S: ?Sized> {
    phase: Phase,
    cache: Option<Arc<S>>,
    callback: Option<CallbackRef<S>>,
    link: Option<ConnectionLink>,
    epoch: u64,
    retries: u32,
}

struct Shared<C: Connector> {
    connector: C,
    ctx: Context,
    ty: ServiceType,
    state: Mutex<State<C::Service>>,
    scheduler: Scheduler,
    tx: mpsc::UnboundedSender<Signal>,
    closed: CancellationToken,
}

/// State machine driving one service connection.
pub struct Connection<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Connection<C> {
    /// Creates an idle controller and spawns its worker on the context runtime.
    pub fn new(connector: C, ctx: &Context) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            connector,
            ctx: ctx.clone(),
            ty: ServiceType::of::<C::Service>(),
            state: Mutex::new(State {
                phase: Phase::Idle,
                cache: None,
                callback: None,
                link: None,
                epoch: 0,
                retries: 0,
            }),
            scheduler: Scheduler::new(),
            tx,
            closed: CancellationToken::new(),
        });

        let weak = Arc::downgrade(&shared);
        let closed = shared.closed.clone();
        ctx.runtime().spawn(worker(weak, rx, closed));

        Self { shared }
    }

    /// Service contract of this connection.
    pub fn service_type(&self) -> ServiceType {
        self.shared.ty
    }

    /// The wrapped connector.
    pub fn connector(&self) -> &C {
        &self.shared.connector
    }

    /// Current state.
    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Returns `true` while connected.
    pub fn is_connected(&self) -> bool {
        self.phase() == Phase::Connected
    }

    /// Cached service, if connected.
    pub fn get(&self) -> Option<Arc<C::Service>> {
        self.shared.state.lock().cache.clone()
    }

    /// Returns `true` if an automatic retry is scheduled.
    pub fn retry_pending(&self) -> bool {
        self.shared.scheduler.is_pending()
    }

    /// Replaces the external callback (`None` clears it).
    pub fn set_callback(&self, callback: Option<CallbackRef<C::Service>>) {
        self.shared.state.lock().callback = callback;
    }

    /// Starts connecting. Ignored unless idle.
    ///
    /// # Errors
    /// [`BrokerError::ConnectionFailed`] if the collaborator could not even start
    /// connecting; the controller is back in [`Phase::Idle`] and nothing is retried.
    pub fn make(&self) -> Result<(), BrokerError> {
        self.shared.make()
    }

    /// Tears the connection down and cancels any pending retry.
    ///
    /// # Errors
    /// [`BrokerError::DisconnectFailed`] if the collaborator refused; the previous
    /// phase is restored.
    pub fn reset(&self) -> Result<(), BrokerError> {
        self.shared.reset()
    }
}

impl<C: Connector> Drop for Shared<C> {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

async fn worker<C: Connector>(
    weak: Weak<Shared<C>>,
    mut rx: mpsc::UnboundedReceiver<Signal>,
    closed: CancellationToken,
) {
    loop {
        let signal = tokio::select! {
            _ = closed.cancelled() => break,
            signal = rx.recv() => match signal {
                Some(signal) => signal,
                None => break,
            },
        };
        let Some(shared) = weak.upgrade() else { break };
        shared.handle(signal);
    }
}

impl<C: Connector> Shared<C> {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_service(self.ty.name())
    }

    fn make(&self) -> Result<(), BrokerError> {
        self.scheduler.cancel();

        let (link, attempt) = {
            let mut st = self.state.lock();
            if st.phase != Phase::Idle {
                return Ok(());
            }
            st.phase = Phase::Connecting;
            st.epoch += 1;
            let link = ConnectionLink::new(st.epoch, self.tx.clone());
            st.link = Some(link.clone());
            (link, st.retries)
        };
        let epoch = link.epoch();
        self.ctx
            .publish(self.event(EventKind::ConnectionStarting).with_attempt(attempt));

        let Err(err) = self.open(link) else {
            return Ok(());
        };

        {
            let mut st = self.state.lock();
            if st.epoch == epoch && st.phase == Phase::Connecting {
                st.phase = Phase::Idle;
                st.link = None;
                st.epoch += 1;
            }
        }
        let reason = err.to_string();
        self.ctx
            .publish(self.event(EventKind::ConnectionFailed).with_reason(reason.as_str()));
        Err(BrokerError::ConnectionFailed {
            service: self.ty.name(),
            reason,
        })
    }

    fn reset(&self) -> Result<(), BrokerError> {
        self.scheduler.cancel();

        let (prev, link, epoch) = {
            let mut st = self.state.lock();
            if st.phase == Phase::Idle {
                return Ok(());
            }
            let prev = st.phase;
            st.phase = Phase::Idle;
            (prev, st.link.clone(), st.epoch)
        };

        if let Some(link) = &link {
            if let Err(err) = self.close(link) {
                {
                    let mut st = self.state.lock();
                    if st.epoch == epoch && st.phase == Phase::Idle {
                        st.phase = prev;
                    }
                }
                let reason = err.to_string();
                self.ctx
                    .publish(self.event(EventKind::DisconnectFailed).with_reason(reason.as_str()));
                return Err(BrokerError::DisconnectFailed {
                    service: self.ty.name(),
                    reason,
                });
            }
        }

        let callback = {
            let mut st = self.state.lock();
            if st.epoch != epoch {
                return Ok(());
            }
            st.epoch += 1;
            st.link = None;
            st.cache = None;
            st.retries = 0;
            st.callback.clone()
        };
        self.ctx.publish(self.event(EventKind::ConnectionReset));
        if prev == Phase::Connected {
            self.fan_out_reset(callback);
        }
        Ok(())
    }

    fn open(&self, link: ConnectionLink) -> Result<(), ConnectorError> {
        let Some(target) = self.connector.target() else {
            return self.connector.connect(link);
        };
        let binder = self.ctx.binder().ok_or(ConnectorError::NoBinder)?;
        if binder.bind(&target, link)? {
            Ok(())
        } else {
            Err(ConnectorError::TargetNotFound {
                target: target.to_string(),
            })
        }
    }

    fn close(&self, link: &ConnectionLink) -> Result<(), ConnectorError> {
        let Some(target) = self.connector.target() else {
            return self.connector.disconnect(link);
        };
        let binder = self.ctx.binder().ok_or(ConnectorError::NoBinder)?;
        binder.unbind(&target, link)
    }

    fn handle(&self, signal: Signal) {
        match signal {
            Signal::Connected { epoch, raw } => self.on_connected(epoch, raw),
            Signal::Disconnected { epoch } => self.on_disconnected(epoch),
            Signal::Failed { epoch, reason } => self.on_failed(epoch, reason),
            Signal::Retry { id } => {
                if self.scheduler.claim(id) {
                    // failures are published by make; only lost connections retry
                    let _ = self.make();
                }
            }
        }
    }

    fn is_current(&self, epoch: u64, phase: Phase) -> bool {
        let st = self.state.lock();
        st.epoch == epoch && st.phase == phase
    }

    fn on_connected(&self, epoch: u64, raw: RawHandle) {
        if !self.is_current(epoch, Phase::Connecting) {
            return;
        }
        let Some(service) = self.connector.convert(raw) else {
            self.ctx.publish(
                self.event(EventKind::ConnectionFailed)
                    .with_reason("raw handle could not be converted"),
            );
            return;
        };

        let callback = {
            let mut st = self.state.lock();
            if st.epoch != epoch || st.phase != Phase::Connecting {
                return;
            }
            self.scheduler.cancel();
            st.phase = Phase::Connected;
            st.cache = Some(service.clone());
            st.retries = 0;
            st.callback.clone()
        };

        self.ctx.publish(self.event(EventKind::ConnectionMade));
        self.connector.on_connection_made(&service);
        if let Some(cb) = callback {
            cb.on_connection_made(&service);
        }
    }

    fn on_disconnected(&self, epoch: u64) {
        let (attempt, was_connected, callback) = {
            let mut st = self.state.lock();
            if st.epoch != epoch || st.phase == Phase::Idle {
                return;
            }
            let was_connected = st.phase == Phase::Connected;
            st.phase = Phase::Idle;
            st.cache = None;
            st.link = None;
            st.epoch += 1;
            let attempt = st.retries;
            st.retries = st.retries.saturating_add(1);
            (attempt, was_connected, st.callback.clone())
        };

        let delay = self.ctx.retry().next(attempt);
        let tx = self.tx.clone();
        self.scheduler.schedule(self.ctx.runtime(), delay, move |id| {
            let _ = tx.send(Signal::Retry { id });
        });

        self.ctx.publish(self.event(EventKind::ConnectionLost));
        self.ctx.publish(
            self.event(EventKind::RetryScheduled)
                .with_attempt(attempt)
                .with_delay(delay),
        );
        if was_connected {
            self.fan_out_reset(callback);
        }
    }

    fn on_failed(&self, epoch: u64, reason: String) {
        {
            let mut st = self.state.lock();
            if st.epoch != epoch || st.phase != Phase::Connecting {
                return;
            }
            st.phase = Phase::Idle;
            st.link = None;
            st.epoch += 1;
        }
        self.ctx
            .publish(self.event(EventKind::ConnectionFailed).with_reason(reason));
    }

    fn fan_out_reset(&self, callback: Option<CallbackRef<C::Service>>) {
        self.connector.on_connection_reset();
        if let Some(cb) = callback {
            cb.on_connection_reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::test_support::{Echo, EchoConnector, ScriptedBinder, context, context_with_binder, settle};

    #[derive(Default)]
    struct Probe {
        made: AtomicUsize,
        resets: AtomicUsize,
    }

    impl ConnectionCallback<Echo> for Probe {
        fn on_connection_made(&self, service: &Arc<Echo>) {
            assert_eq!(service.ping(), "pong");
            self.made.fetch_add(1, Ordering::SeqCst);
        }

        fn on_connection_reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn declarative(binder: &Arc<ScriptedBinder>) -> (Connection<EchoConnector>, Arc<Probe>) {
        let ctx = context_with_binder("root", binder.clone());
        let conn = Connection::new(EchoConnector::declarative("echo"), &ctx);
        let probe = Arc::new(Probe::default());
        conn.set_callback(Some(probe.clone()));
        (conn, probe)
    }

    async fn connect(conn: &Connection<EchoConnector>, binder: &ScriptedBinder) {
        conn.make().expect("make");
        binder.last_link().expect("bound").connected_with(Arc::new(Echo));
        settle().await;
    }

    #[tokio::test]
    async fn declarative_connect_caches_and_fans_out() {
        let binder = ScriptedBinder::arc();
        let (conn, probe) = declarative(&binder);

        conn.make().expect("make");
        assert_eq!(conn.phase(), Phase::Connecting);
        assert!(conn.get().is_none());

        binder.last_link().expect("bound").connected_with(Arc::new(Echo));
        settle().await;

        assert!(conn.is_connected());
        assert!(conn.get().is_some());
        assert_eq!(conn.connector().made.load(Ordering::SeqCst), 1);
        assert_eq!(probe.made.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn manual_connector_uses_its_own_link() {
        let conn = Connection::new(EchoConnector::manual(), &context("root"));

        conn.make().expect("make");
        let link = conn.connector().last_manual_link().expect("connect called");
        link.connected_with(Arc::new(Echo));
        settle().await;

        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn duplicate_make_is_ignored() {
        let binder = ScriptedBinder::arc();
        let (conn, _) = declarative(&binder);

        conn.make().expect("make");
        conn.make().expect("duplicate");
        assert_eq!(binder.binds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn synchronous_connect_failure_reverts_to_idle() {
        let binder = ScriptedBinder::arc();
        let (conn, _) = declarative(&binder);

        binder.set_missing(true);
        let err = conn.make().expect_err("target missing");
        assert_eq!(err.as_label(), "connection_failed");
        assert_eq!(conn.phase(), Phase::Idle);
        assert!(!conn.retry_pending());

        binder.set_missing(false);
        binder.fail_bind(true);
        let err = conn.make().expect_err("refused");
        assert!(err.as_message().contains("bind refused"));
        assert_eq!(conn.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn declarative_connector_needs_a_binder() {
        let conn = Connection::new(EchoConnector::declarative("echo"), &context("root"));

        let err = conn.make().expect_err("no binder");
        assert!(matches!(err, BrokerError::ConnectionFailed { .. }));
        assert_eq!(conn.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn async_failure_is_not_retried() {
        let binder = ScriptedBinder::arc();
        let (conn, probe) = declarative(&binder);

        conn.make().expect("make");
        binder.last_link().expect("bound").failed("handshake");
        settle().await;

        assert_eq!(conn.phase(), Phase::Idle);
        assert!(!conn.retry_pending());
        assert_eq!(probe.resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconvertible_handle_keeps_connecting() {
        let binder = ScriptedBinder::arc();
        let (conn, probe) = declarative(&binder);

        conn.make().expect("make");
        binder.last_link().expect("bound").connected(Arc::new(42u8));
        settle().await;

        assert_eq!(conn.phase(), Phase::Connecting);
        assert_eq!(probe.made.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_connection_is_retried_after_the_delay() {
        let binder = ScriptedBinder::arc();
        let (conn, probe) = declarative(&binder);

        connect(&conn, &binder).await;
        binder.last_link().expect("bound").disconnected();
        settle().await;

        assert_eq!(conn.phase(), Phase::Idle);
        assert!(conn.get().is_none());
        assert!(conn.retry_pending());
        assert_eq!(probe.resets.load(Ordering::SeqCst), 1);
        assert_eq!(conn.connector().resets.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(999)).await;
        settle().await;
        assert_eq!(binder.binds.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(binder.binds.load(Ordering::SeqCst), 2);
        assert_eq!(conn.phase(), Phase::Connecting);
        assert!(!conn.retry_pending());

        binder.last_link().expect("rebound").connected_with(Arc::new(Echo));
        settle().await;
        assert!(conn.is_connected());
        assert_eq!(probe.made.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_events_carry_attempt_and_delay() {
        let binder = ScriptedBinder::arc();
        let ctx = context_with_binder("root", binder.clone());
        let mut rx = ctx.bus().subscribe();
        let conn = Connection::new(EchoConnector::declarative("echo"), &ctx);

        connect(&conn, &binder).await;
        binder.last_link().expect("bound").disconnected();
        settle().await;

        let mut scheduled = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::RetryScheduled {
                scheduled = Some(ev);
            }
        }
        let ev = scheduled.expect("retry scheduled");
        assert_eq!(ev.attempt, Some(0));
        assert_eq!(ev.delay_ms, Some(1000));
        assert_eq!(ev.scope.as_deref(), Some("root"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_a_pending_retry() {
        let binder = ScriptedBinder::arc();
        let (conn, _) = declarative(&binder);

        connect(&conn, &binder).await;
        binder.last_link().expect("bound").disconnected();
        settle().await;
        assert!(conn.retry_pending());

        conn.reset().expect("reset from idle");
        assert!(!conn.retry_pending());

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(binder.binds.load(Ordering::SeqCst), 1);
        assert_eq!(conn.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn flapping_connection_keeps_a_single_pending_retry() {
        let binder = ScriptedBinder::arc();
        let (conn, _) = declarative(&binder);

        for round in 1..=3 {
            connect(&conn, &binder).await;
            binder.last_link().expect("bound").disconnected();
            binder.last_link().expect("bound").disconnected();
            settle().await;
            assert!(conn.retry_pending());

            tokio::time::sleep(Duration::from_millis(1001)).await;
            settle().await;
            assert_eq!(binder.binds.load(Ordering::SeqCst), 2 * round);
            assert_eq!(conn.phase(), Phase::Connecting);
            conn.reset().expect("reset");
        }
    }

    #[tokio::test]
    async fn stale_link_signals_are_ignored() {
        let binder = ScriptedBinder::arc();
        let (conn, probe) = declarative(&binder);

        conn.make().expect("make");
        let stale = binder.last_link().expect("bound");
        conn.reset().expect("reset");

        stale.connected_with(Arc::new(Echo));
        settle().await;
        assert_eq!(conn.phase(), Phase::Idle);
        assert_eq!(probe.made.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_reset_restores_the_connection() {
        let binder = ScriptedBinder::arc();
        let (conn, probe) = declarative(&binder);
        connect(&conn, &binder).await;

        binder.fail_unbind(true);
        let err = conn.reset().expect_err("refused");
        assert!(matches!(err, BrokerError::DisconnectFailed { .. }));
        assert!(conn.is_connected());
        assert!(conn.get().is_some());
        assert_eq!(probe.resets.load(Ordering::SeqCst), 0);

        binder.fail_unbind(false);
        conn.reset().expect("reset");
        assert_eq!(conn.phase(), Phase::Idle);
        assert!(conn.get().is_none());
        assert_eq!(probe.resets.load(Ordering::SeqCst), 1);
        assert_eq!(binder.unbinds.load(Ordering::SeqCst), 2);
    }
}
