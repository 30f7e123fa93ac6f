//! # Supervisor: owns the handles, schedules sweeps, reports status.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the indexed
//! collection of handles and one [`HandleActor`] per handle.
//!
//! ## Key responsibilities
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`]
//! - spawn one actor per credential, each with a child cancellation token
//! - turn `connect_all` / `connect_one` into per-handle connect commands
//! - serve read-only status snapshots that never wait on a connect
//! - perform graceful shutdown within [`Config::grace`], including draining
//!   subscriber queues so queued alerts are still delivered
//!
//! ## High-level architecture
//! ```text
//! initialize(credentials):
//!   Credential[0]   Credential[1]   ...   Credential[N-1]
//!        │               │                      │
//!        └──► ConnectionHandle (Arc<RwLock>) + HandleActor (child token)
//!
//! connect_all(stagger):
//!   StaggerPolicy::delays(N) ──► Connect{delay[i]} ──► actor[i]
//!
//! connect_one(id):
//!   id < N ? Connect{0} ──► actor[id]  :  Err(InvalidHandle)
//!
//! Event flow:
//!   HandleActor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!
//! Shutdown path:
//!   Bus.publish(ShutdownRequested)
//!   runtime_token.cancel()          → every actor closes its session and exits
//!   wait_all_with_grace(cfg.grace):
//!      ├─ Ok (all joined)  → Bus.publish(AllStoppedWithin)
//!      └─ Timeout exceeded → Bus.publish(GraceExceeded), Err(GraceExceeded{stuck})
//!   drain_subscribers(same deadline):
//!      listener forwards what is left on the bus, then SubscriberSet::shutdown()
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use linkvisor::{Config, LogWriter, Supervisor, Subscribe, parse_credentials};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = parse_credentials(Some(r#"["tokA", "tokB"]"#), None)?;
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     let sup = Supervisor::builder(Config::default())
//!         .with_subscribers(subs)
//!         .initialize(credentials)?;
//!
//!     sup.connect_all(true);
//!     let status = sup.status_snapshot().await;
//!     println!("{} handles", status.handle_count);
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::actor::{Command, HandleActor, HandleActorParams};
use super::builder::SupervisorBuilder;
use super::handle::{ConnectionHandle, HandleState, HandleStatus};
use crate::config::{Config, ReconnectMode};
use crate::credentials::Credential;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::gateway::Gateway;
use crate::subscribers::SubscriberSet;

/// Supervisor-side end of one handle.
struct Slot {
    shared: Arc<RwLock<ConnectionHandle>>,
    commands: mpsc::UnboundedSender<Command>,
}

/// Read-only view of the whole supervisor.
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub mode: ReconnectMode,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub sweeps: u64,
    pub handle_count: usize,
    pub connected: usize,
    pub handles: Vec<HandleStatus>,
}

/// Coordinates handle actors, event delivery (via [`SubscriberSet`]), and graceful shutdown.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    slots: Vec<Slot>,
    runtime_token: CancellationToken,
    listener_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
    actors: Mutex<JoinSet<usize>>,
    started: Instant,
    started_at: DateTime<Utc>,
    sweeps: AtomicU64,
}

impl Supervisor {
    /// Starts building a supervisor.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        gateway: Arc<dyn Gateway>,
        credentials: Vec<Credential>,
    ) -> Self {
        let runtime_token = CancellationToken::new();
        let params = HandleActorParams {
            mode: cfg.mode,
            connect_timeout: cfg.connect_timeout_or_default(),
            backoff: cfg.backoff,
            disconnect_delay: cfg.disconnect_delay,
        };

        let mut sup = Self {
            cfg,
            bus,
            subs,
            slots: Vec::with_capacity(credentials.len()),
            runtime_token,
            listener_token: CancellationToken::new(),
            listener: Mutex::new(None),
            actors: Mutex::new(JoinSet::new()),
            started: Instant::now(),
            started_at: Utc::now(),
            sweeps: AtomicU64::new(0),
        };
        sup.listener = Mutex::new(Some(sup.subscriber_listener()));
        sup.spawn_actors(gateway, params, credentials)
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    ///
    /// Runs until `listener_token` is cancelled, then forwards whatever is
    /// still buffered on the bus and exits.
    fn subscriber_listener(&self) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let stop = self.listener_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event listener lagged behind the bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    },
                    _ = stop.cancelled() => break,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged behind the bus");
                    }
                    Err(_) => break,
                }
            }
        })
    }

    /// Creates the handles and spawns one actor per credential.
    fn spawn_actors(
        mut self,
        gateway: Arc<dyn Gateway>,
        params: HandleActorParams,
        credentials: Vec<Credential>,
    ) -> Self {
        let mut set = JoinSet::new();
        for (id, credential) in credentials.into_iter().enumerate() {
            let shared = Arc::new(RwLock::new(ConnectionHandle::new(id, credential.clone())));
            let (actor, commands, inbox) = HandleActor::new(
                Arc::clone(&shared),
                id,
                credential,
                Arc::clone(&gateway),
                self.bus.clone(),
                params.clone(),
            );
            let child = self.runtime_token.child_token();
            set.spawn(async move {
                actor.run(inbox, child).await;
                id
            });
            self.slots.push(Slot { shared, commands });
        }
        self.actors = Mutex::new(set);
        self
    }

    /// Number of handles.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: a supervisor cannot be built without credentials.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reconnection mode this supervisor runs in.
    pub fn mode(&self) -> ReconnectMode {
        self.cfg.mode
    }

    /// Returns a receiver for all subsequent runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Schedules a connect attempt for every handle, in index order.
    ///
    /// With `stagger`, handle `i` waits a cumulative random delay within
    /// `[i × min_step, i × max_step]`; otherwise all attempts are immediate.
    /// Each handle applies its own rules when the delay elapses (backoff while
    /// `Errored`, teardown while `Connected`, ignored while `Connecting`).
    ///
    /// Returns the delays that were scheduled.
    pub fn connect_all(&self, stagger: bool) -> Vec<Duration> {
        let sweep = self.sweeps.fetch_add(1, Ordering::Relaxed) + 1;
        self.bus.publish(
            Event::new(EventKind::SweepRequested)
                .with_attempt(sweep)
                .with_reason(if stagger { "staggered" } else { "immediate" }),
        );

        let delays = self.cfg.stagger.delays(self.slots.len(), stagger);
        for (id, (slot, delay)) in self.slots.iter().zip(&delays).enumerate() {
            if slot.commands.send(Command::Connect { delay: *delay }).is_err() {
                debug!(handle = id, "actor gone, sweep skipped handle");
            }
        }
        delays
    }

    /// Requests a connect attempt for one handle.
    ///
    /// The attempt starts immediately unless the handle is `Errored` with a
    /// pending backoff, in which case it waits for the backoff first.
    ///
    /// # Errors
    /// - [`RuntimeError::InvalidHandle`] if `id` is out of range;
    /// - [`RuntimeError::HandleClosed`] if the actor already stopped (shutdown).
    pub fn connect_one(&self, id: usize) -> Result<(), RuntimeError> {
        let slot = self.slots.get(id).ok_or(RuntimeError::InvalidHandle {
            id,
            len: self.slots.len(),
        })?;
        slot.commands
            .send(Command::Connect {
                delay: Duration::ZERO,
            })
            .map_err(|_| RuntimeError::HandleClosed { id })
    }

    /// Returns the current status of every handle.
    ///
    /// Each handle lock is only held for a copy; actors never hold it across
    /// I/O, so this never waits on an in-flight connect.
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let mut handles = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            handles.push(slot.shared.read().await.status());
        }
        let connected = handles
            .iter()
            .filter(|h| h.state == HandleState::Connected)
            .count();

        StatusSnapshot {
            mode: self.cfg.mode,
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            handle_count: self.slots.len(),
            connected,
            handles,
        }
    }

    /// Stops every actor and waits for them within the configured grace period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the ids of the stuck handles.
    /// Subscriber queues (pending alerts included) are then drained within
    /// what is left of the same grace period.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let deadline = time::Instant::now() + self.cfg.grace;
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();
        let res = self.wait_all_with_grace().await;
        self.drain_subscribers(deadline).await;
        res
    }

    async fn drain_subscribers(&self, deadline: time::Instant) {
        self.listener_token.cancel();
        let listener = self.listener.lock().await.take();
        let drained = time::timeout_at(deadline, async {
            if let Some(handle) = listener {
                if let Err(e) = handle.await {
                    warn!(error = %e, "event listener ended abnormally");
                }
            }
            self.subs.shutdown().await;
        })
        .await;
        if drained.is_err() {
            warn!(
                subscribers = self.subs.len(),
                "subscriber queues not drained within grace"
            );
        }
    }

    async fn wait_all_with_grace(&self) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let mut set = self.actors.lock().await;
        let mut stopped = vec![false; self.slots.len()];

        let done = async {
            while let Some(res) = set.join_next().await {
                match res {
                    Ok(id) => {
                        if let Some(flag) = stopped.get_mut(id) {
                            *flag = true;
                        }
                    }
                    Err(e) => warn!(error = %e, "handle actor ended abnormally"),
                }
            }
        };
        let timed = tokio::time::timeout(grace, done).await;

        match timed {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck: Vec<usize> = stopped
                    .iter()
                    .enumerate()
                    .filter_map(|(id, done)| (!done).then_some(id))
                    .collect();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_reason(format!("stuck handles: {stuck:?}")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}
