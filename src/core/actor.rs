//! # HandleActor: single-handle supervisor.
//!
//! Owns one [`ConnectionHandle`]'s live session and every timer that concerns
//! it. All transitions of that handle happen inside [`HandleActor::run`], one
//! at a time, so no two events for the same handle ever race.
//!
//! ## Event flow
//! ```text
//! Connect{delay} ─► ConnectRequested ─► [pending timer] ─┬─► Connecting ─┬─► Ready
//!                                                        │               ├─► Errored
//!                            (Errored with backoff) ◄────┘               └─► TimeoutHit → Errored
//!                            BackoffScheduled → [pending timer]
//!
//! Connected ─► (peer close) ─► Disconnected
//! Connected ─► Connect{..}  ─► SessionTornDown ─► Connecting
//! ```
//!
//! ## Architecture
//! ```text
//! loop select! {
//!   ├─► token.cancelled()      → close session, exit
//!   ├─► commands.recv()        → request_connect(delay)
//!   ├─► events.recv()          → on_gateway_event(generation, event)
//!   ├─► pending timer fired    → fire_pending()
//!   └─► connect deadline fired → on_timeout()
//! }
//! ```
//!
//! ## Rules
//! - At most one attempt is outstanding; a request while `Connecting` is ignored.
//! - At most one pending attempt; concurrent requests collapse to the earliest,
//!   except that a pending attempt already pushed out by backoff is kept.
//!   `ConnectRequested` is only published for a request that changed the
//!   pending attempt.
//! - The connect deadline is cleared the moment Ready or Error is processed.
//! - Gateway events from an older attempt generation are dropped.
//! - The shared [`ConnectionHandle`] lock is never held across an `.await`
//!   other than its own acquisition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{RwLock, mpsc};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::handle::{ConnectionHandle, HandleState};
use crate::classify::{Classification, classify};
use crate::config::ReconnectMode;
use crate::credentials::Credential;
use crate::events::{Bus, Event, EventKind};
use crate::gateway::{Connection, EventSink, Gateway, GatewayEvent, Tagged};
use crate::policies::BackoffPolicy;

/// Request sent by the supervisor to one actor.
#[derive(Debug)]
pub(crate) enum Command {
    /// Schedule an attempt after `delay`.
    Connect { delay: Duration },
}

/// Timing knobs copied from [`Config`](crate::Config) at spawn.
#[derive(Clone, Debug)]
pub(crate) struct HandleActorParams {
    pub mode: ReconnectMode,
    pub connect_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub disconnect_delay: Duration,
}

/// Receiving halves, kept apart from the actor so `select!` can borrow them
/// while handlers take `&mut self`.
pub(crate) struct Inbox {
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<Tagged>,
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    at: Instant,
    /// Backoff was already applied to `at`.
    backoff_applied: bool,
}

pub(crate) struct HandleActor {
    id: usize,
    credential: Credential,
    shared: Arc<RwLock<ConnectionHandle>>,
    gateway: Arc<dyn Gateway>,
    bus: Bus,
    params: HandleActorParams,
    events_tx: mpsc::UnboundedSender<Tagged>,
    session: Option<Box<dyn Connection>>,
    pending: Option<Pending>,
    deadline: Option<Instant>,
}

impl HandleActor {
    /// Creates the actor, its command sender and its inbox.
    ///
    /// The gateway event channel is created here, once per handle; every
    /// attempt reports through a sink cloned from it.
    pub(crate) fn new(
        shared: Arc<RwLock<ConnectionHandle>>,
        id: usize,
        credential: Credential,
        gateway: Arc<dyn Gateway>,
        bus: Bus,
        params: HandleActorParams,
    ) -> (Self, mpsc::UnboundedSender<Command>, Inbox) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let actor = Self {
            id,
            credential,
            shared,
            gateway,
            bus,
            params,
            events_tx: ev_tx,
            session: None,
            pending: None,
            deadline: None,
        };
        let inbox = Inbox {
            commands: cmd_rx,
            events: ev_rx,
        };
        (actor, cmd_tx, inbox)
    }

    /// Runs until `token` is cancelled or the supervisor drops its sender.
    pub(crate) async fn run(mut self, mut inbox: Inbox, token: CancellationToken) {
        loop {
            let pending_at = self.pending.map(|p| p.at);
            let deadline = self.deadline;

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                cmd = inbox.commands.recv() => match cmd {
                    Some(Command::Connect { delay }) => self.request_connect(delay).await,
                    None => break,
                },
                Some((generation, ev)) = inbox.events.recv() => {
                    self.on_gateway_event(generation, ev).await;
                }
                _ = sleep_until_opt(pending_at) => self.fire_pending().await,
                _ = sleep_until_opt(deadline) => self.on_timeout().await,
            }
        }
        self.close_session();
        debug!(handle = self.id, "handle actor stopped");
    }

    async fn request_connect(&mut self, delay: Duration) {
        let state = self.shared.read().await.state();
        if state == HandleState::Connecting {
            debug!(handle = self.id, "connect request ignored: attempt in flight");
            return;
        }
        self.request_after(delay).await;
    }

    /// Schedules a plain attempt and reports it when it was accepted.
    async fn request_after(&mut self, delay: Duration) {
        if self.schedule(delay, false).await {
            self.bus.publish(
                Event::new(EventKind::ConnectRequested)
                    .with_handle(self.id)
                    .with_delay(delay),
            );
        } else {
            debug!(handle = self.id, ?delay, "connect request merged into pending attempt");
        }
    }

    /// Sets the pending attempt, keeping an earlier or backoff-adjusted one.
    ///
    /// Returns `false` when the existing pending attempt was kept.
    async fn schedule(&mut self, delay: Duration, backoff_applied: bool) -> bool {
        let at = Instant::now() + delay;
        if let Some(p) = self.pending {
            if !backoff_applied && (p.backoff_applied || p.at <= at) {
                return false;
            }
        }
        self.pending = Some(Pending {
            at,
            backoff_applied,
        });
        let wall = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        self.shared.write().await.set_next_reconnect(wall);
        true
    }

    async fn fire_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let (state, backoff, consecutive, identity) = {
            let h = self.shared.read().await;
            (
                h.state(),
                h.reconnect_delay(),
                h.consecutive_errors(),
                h.identity().map(str::to_string),
            )
        };

        match state {
            HandleState::Connecting => {
                debug!(handle = self.id, "pending attempt dropped: attempt in flight");
                self.shared.write().await.set_next_reconnect(None);
            }
            HandleState::Errored if !backoff.is_zero() && !pending.backoff_applied => {
                self.bus.publish(
                    Event::new(EventKind::BackoffScheduled)
                        .with_handle(self.id)
                        .with_delay(backoff)
                        .with_consecutive(consecutive),
                );
                self.schedule(backoff, true).await;
            }
            HandleState::Connected => {
                self.close_session();
                self.bus.publish(
                    Event::new(EventKind::SessionTornDown)
                        .with_handle(self.id)
                        .with_identity_opt(identity.as_deref()),
                );
                self.start_attempt().await;
            }
            HandleState::Disconnected | HandleState::Errored => self.start_attempt().await,
        }
    }

    async fn start_attempt(&mut self) {
        self.close_session();
        let attempt = self.shared.write().await.begin_connect(Utc::now());
        let timeout = self.params.connect_timeout;
        self.deadline = Some(Instant::now() + timeout);

        self.bus.publish(
            Event::new(EventKind::Connecting)
                .with_handle(self.id)
                .with_attempt(attempt)
                .with_timeout(timeout),
        );

        let mut conn = self.gateway.open(&self.credential);
        conn.connect(EventSink::new(self.events_tx.clone(), attempt));
        self.session = Some(conn);
    }

    async fn on_gateway_event(&mut self, generation: u64, ev: GatewayEvent) {
        let (state, attempt) = {
            let h = self.shared.read().await;
            (h.state(), h.attempt())
        };
        if generation != attempt {
            debug!(handle = self.id, generation, attempt, "stale gateway event dropped");
            return;
        }

        match (state, ev) {
            (HandleState::Connecting, GatewayEvent::Ready { user }) => {
                self.deadline = None;
                let identity = {
                    let mut h = self.shared.write().await;
                    h.mark_ready(&user);
                    h.identity().map(str::to_string)
                };
                self.bus.publish(
                    Event::new(EventKind::Ready)
                        .with_handle(self.id)
                        .with_attempt(attempt)
                        .with_identity_opt(identity.as_deref()),
                );
            }
            (HandleState::Connecting | HandleState::Connected, GatewayEvent::Error { message }) => {
                let classification = classify(&message, &self.credential);
                self.fail(classification, attempt).await;
            }
            (HandleState::Connecting, GatewayEvent::Disconnected { reason }) => {
                let text = format!("connection closed before ready: {reason}");
                let classification = classify(&text, &self.credential);
                self.fail(classification, attempt).await;
            }
            (HandleState::Connected, GatewayEvent::Disconnected { reason }) => {
                self.close_session();
                let identity = {
                    let mut h = self.shared.write().await;
                    h.mark_disconnected();
                    h.identity().map(str::to_string)
                };
                self.bus.publish(
                    Event::new(EventKind::Disconnected)
                        .with_handle(self.id)
                        .with_identity_opt(identity.as_deref())
                        .with_reason(self.credential.redact(&reason)),
                );
                if self.params.mode == ReconnectMode::Internal {
                    self.request_after(self.params.disconnect_delay).await;
                }
            }
            (state, ev) => {
                debug!(handle = self.id, %state, event = ?kind_of(&ev), "gateway event ignored");
            }
        }
    }

    async fn on_timeout(&mut self) {
        self.deadline = None;
        let (state, attempt) = {
            let h = self.shared.read().await;
            (h.state(), h.attempt())
        };
        if state != HandleState::Connecting {
            return;
        }
        self.bus.publish(
            Event::new(EventKind::TimeoutHit)
                .with_handle(self.id)
                .with_attempt(attempt)
                .with_timeout(self.params.connect_timeout),
        );
        self.fail(Classification::timeout(), attempt).await;
    }

    /// Moves the handle to `Errored`, closes the session and, in internal
    /// mode, schedules the next attempt after the backoff.
    async fn fail(&mut self, error: Classification, attempt: u64) {
        self.deadline = None;
        self.close_session();

        let (backoff, consecutive, identity) = {
            let mut h = self.shared.write().await;
            let backoff = h.mark_errored(error.clone(), &self.params.backoff, Utc::now());
            (
                backoff,
                h.consecutive_errors(),
                h.identity().map(str::to_string),
            )
        };

        self.bus.publish(
            Event::new(EventKind::Errored)
                .with_handle(self.id)
                .with_attempt(attempt)
                .with_identity_opt(identity.as_deref())
                .with_error_kind(error.kind)
                .with_reason(error.message)
                .with_consecutive(consecutive)
                .with_delay(backoff),
        );

        if self.params.mode == ReconnectMode::Internal {
            self.pending = None;
            self.schedule(backoff, true).await;
        }
    }

    fn close_session(&mut self) {
        if let Some(mut conn) = self.session.take() {
            conn.close();
        }
    }
}

fn kind_of(ev: &GatewayEvent) -> &'static str {
    match ev {
        GatewayEvent::Ready { .. } => "ready",
        GatewayEvent::Error { .. } => "error",
        GatewayEvent::Disconnected { .. } => "disconnected",
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorKind;
    use crate::gateway::testing::{FakeGateway, Script};

    const RAW: &str = "abcd1234efgh5678";

    struct Harness {
        gateway: FakeGateway,
        shared: Arc<RwLock<ConnectionHandle>>,
        commands: mpsc::UnboundedSender<Command>,
        events: tokio::sync::broadcast::Receiver<Event>,
        token: CancellationToken,
    }

    fn params(mode: ReconnectMode) -> HandleActorParams {
        HandleActorParams {
            mode,
            connect_timeout: Duration::from_secs(60),
            backoff: BackoffPolicy::default(),
            disconnect_delay: Duration::from_secs(5),
        }
    }

    fn spawn(mode: ReconnectMode) -> Harness {
        let gateway = FakeGateway::new();
        let credential = Credential::new(RAW, 0).unwrap();
        let shared = Arc::new(RwLock::new(ConnectionHandle::new(0, credential.clone())));
        let bus = Bus::new(256);
        let events = bus.subscribe();
        let (actor, commands, inbox) = HandleActor::new(
            Arc::clone(&shared),
            0,
            credential,
            Arc::new(gateway.clone()),
            bus,
            params(mode),
        );
        let token = CancellationToken::new();
        tokio::spawn(actor.run(inbox, token.clone()));
        Harness {
            gateway,
            shared,
            commands,
            events,
            token,
        }
    }

    /// Lets the actor drain everything that is ready without moving the clock.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn state(h: &Harness) -> HandleState {
        h.shared.read().await.state()
    }

    fn drain(h: &mut Harness) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = h.events.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    fn connect(h: &Harness, delay: Duration) {
        h.commands.send(Command::Connect { delay }).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_transitions_to_connected() {
        let mut h = spawn(ReconnectMode::External);
        h.gateway.script(RAW, Script::Ready("bot".into()));

        connect(&h, Duration::ZERO);
        settle().await;

        assert_eq!(state(&h).await, HandleState::Connected);
        assert_eq!(h.shared.read().await.identity(), Some("bot"));
        assert_eq!(
            drain(&mut h),
            vec![
                EventKind::ConnectRequested,
                EventKind::Connecting,
                EventKind::Ready
            ]
        );
        h.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_forces_errored() {
        let mut h = spawn(ReconnectMode::External);
        connect(&h, Duration::ZERO);
        settle().await;
        assert_eq!(state(&h).await, HandleState::Connecting);

        time::advance(Duration::from_secs(61)).await;
        settle().await;

        let handle = h.shared.read().await;
        assert_eq!(handle.state(), HandleState::Errored);
        assert_eq!(
            handle.last_error().map(|e| e.kind),
            Some(ErrorKind::ConnectionTimeout)
        );
        drop(handle);
        assert!(drain(&mut h).contains(&EventKind::TimeoutHit));
        assert_eq!(h.gateway.closes(RAW), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_before_timeout_never_errors_later() {
        let mut h = spawn(ReconnectMode::External);
        connect(&h, Duration::ZERO);
        settle().await;

        time::advance(Duration::from_secs(30)).await;
        assert!(h.gateway.emit(RAW, GatewayEvent::Ready { user: "bot".into() }));
        settle().await;

        time::advance(Duration::from_secs(120)).await;
        settle().await;

        assert_eq!(state(&h).await, HandleState::Connected);
        let kinds = drain(&mut h);
        assert!(!kinds.contains(&EventKind::TimeoutHit));
        assert!(!kinds.contains(&EventKind::Errored));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_before_timeout_is_counted_once() {
        let h = spawn(ReconnectMode::External);
        h.gateway.script(RAW, Script::Fail("HTTP 429".into()));
        connect(&h, Duration::ZERO);
        settle().await;

        time::advance(Duration::from_secs(120)).await;
        settle().await;

        let handle = h.shared.read().await;
        assert_eq!(handle.state(), HandleState::Errored);
        assert_eq!(handle.error_count(), 1);
        assert_eq!(handle.last_error().map(|e| e.kind), Some(ErrorKind::RateLimited));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_dropped() {
        let h = spawn(ReconnectMode::External);
        connect(&h, Duration::ZERO);
        settle().await;
        let old = h.gateway.sink(RAW).unwrap();

        // Error the first attempt, then start a second one.
        assert!(h.gateway.emit(RAW, GatewayEvent::Error { message: "boom".into() }));
        settle().await;
        connect(&h, Duration::ZERO);
        settle().await;
        time::advance(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(h.shared.read().await.attempt(), 2);
        assert_eq!(state(&h).await, HandleState::Connecting);

        old.emit(GatewayEvent::Ready { user: "ghost".into() });
        settle().await;
        assert_eq!(state(&h).await, HandleState::Connecting);
        assert_eq!(h.shared.read().await.identity(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errored_request_waits_for_backoff() {
        let mut h = spawn(ReconnectMode::External);
        h.gateway.script(RAW, Script::Fail("boom".into()));
        connect(&h, Duration::ZERO);
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 1);
        drain(&mut h);

        connect(&h, Duration::ZERO);
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 1);
        assert!(drain(&mut h).contains(&EventKind::BackoffScheduled));

        time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 1);

        time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_while_connecting_is_ignored() {
        let h = spawn(ReconnectMode::External);
        connect(&h, Duration::ZERO);
        settle().await;
        connect(&h, Duration::ZERO);
        connect(&h, Duration::ZERO);
        settle().await;
        assert_eq!(h.gateway.opened(RAW), 1);
        assert_eq!(h.shared.read().await.attempt(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_is_torn_down_before_reconnect() {
        let mut h = spawn(ReconnectMode::External);
        h.gateway.script(RAW, Script::Ready("bot".into()));
        connect(&h, Duration::ZERO);
        settle().await;
        drain(&mut h);

        connect(&h, Duration::ZERO);
        settle().await;

        assert_eq!(h.gateway.closes(RAW), 1);
        assert_eq!(h.gateway.opened(RAW), 2);
        let kinds = drain(&mut h);
        let torn = kinds.iter().position(|k| *k == EventKind::SessionTornDown);
        let connecting = kinds.iter().position(|k| *k == EventKind::Connecting);
        assert!(torn.is_some() && torn < connecting);
        assert_eq!(state(&h).await, HandleState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_requests_collapse_to_earliest() {
        let h = spawn(ReconnectMode::External);
        connect(&h, Duration::from_secs(20));
        connect(&h, Duration::from_secs(10));
        connect(&h, Duration::from_secs(15));
        settle().await;

        time::advance(Duration::from_secs(11)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 1);

        time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_merged_requests_are_not_reported() {
        let mut h = spawn(ReconnectMode::External);
        connect(&h, Duration::from_secs(20));
        connect(&h, Duration::from_secs(10));
        connect(&h, Duration::from_secs(15));
        connect(&h, Duration::from_secs(30));
        settle().await;

        let requested = drain(&mut h)
            .into_iter()
            .filter(|k| *k == EventKind::ConnectRequested)
            .count();
        assert_eq!(requested, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_internal_mode_retries_after_backoff() {
        let h = spawn(ReconnectMode::Internal);
        h.gateway.script(RAW, Script::Fail("boom".into()));
        connect(&h, Duration::ZERO);
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 1);

        time::advance(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 2);

        // Second failure doubles the wait.
        time::advance(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 2);
        time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 3);
        assert_eq!(h.shared.read().await.consecutive_errors(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_mode_does_not_retry() {
        let h = spawn(ReconnectMode::External);
        h.gateway.script(RAW, Script::Fail("boom".into()));
        connect(&h, Duration::ZERO);
        settle().await;

        time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 1);
        assert_eq!(state(&h).await, HandleState::Errored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_close_reconnects_in_internal_mode() {
        let mut h = spawn(ReconnectMode::Internal);
        h.gateway.script(RAW, Script::Ready("bot".into()));
        connect(&h, Duration::ZERO);
        settle().await;

        assert!(h.gateway.emit(RAW, GatewayEvent::Disconnected { reason: "closed by peer (1000)".into() }));
        settle().await;
        assert_eq!(state(&h).await, HandleState::Disconnected);
        assert!(drain(&mut h).contains(&EventKind::Disconnected));

        time::advance(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(h.gateway.connects(RAW), 2);
        assert_eq!(state(&h).await, HandleState::Connected);
        assert_eq!(h.shared.read().await.error_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_before_ready_counts_as_error() {
        let h = spawn(ReconnectMode::External);
        connect(&h, Duration::ZERO);
        settle().await;
        assert!(h.gateway.emit(RAW, GatewayEvent::Disconnected { reason: "closed by peer (1000)".into() }));
        settle().await;
        assert_eq!(state(&h).await, HandleState::Errored);
        assert_eq!(h.shared.read().await.error_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_masked_in_events() {
        let mut h = spawn(ReconnectMode::External);
        h.gateway
            .script(RAW, Script::Fail(format!("Invalid token {RAW}")));
        connect(&h, Duration::ZERO);
        settle().await;

        let mut seen = false;
        while let Ok(ev) = h.events.try_recv() {
            if ev.kind == EventKind::Errored {
                seen = true;
                assert_eq!(ev.error_kind, Some(ErrorKind::AuthFailure));
                assert!(!ev.reason.unwrap().contains(RAW));
            }
        }
        assert!(seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_closes_session() {
        let h = spawn(ReconnectMode::Internal);
        h.gateway.script(RAW, Script::Ready("bot".into()));
        connect(&h, Duration::ZERO);
        settle().await;
        h.token.cancel();
        settle().await;
        assert_eq!(h.gateway.closes(RAW), 1);
        assert!(!h.gateway.emit(RAW, GatewayEvent::Ready { user: "x".into() }));
    }
}
