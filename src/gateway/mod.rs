//! # Gateway seam: opaque platform connections.
//!
//! The supervisor never speaks the platform protocol itself. It asks a
//! [`Gateway`] for a fresh [`Connection`] per attempt, starts it with an
//! [`EventSink`], and reacts to the [`GatewayEvent`]s that come back.
//!
//! ```text
//!   HandleActor ── open(credential) ──► Gateway ──► Box<dyn Connection>
//!        ▲                                               │ connect(sink)
//!        │                                               ▼
//!        └──── (generation, GatewayEvent) ◄──── EventSink (per attempt)
//! ```
//!
//! ## Rules
//! - One event channel per handle, created once when the handle's actor starts;
//!   every attempt gets a sink cloned from it.
//! - A sink is tagged with the attempt generation that created it. The actor
//!   drops events whose generation is not the current attempt, so a late event
//!   from a replaced session can never move the handle.
//! - `connect` must not block; implementations spawn their own I/O.
//! - `close` is idempotent and must not emit further events.

mod ws;

#[cfg(test)]
pub(crate) mod testing;

use tokio::sync::mpsc;

use crate::credentials::Credential;

pub use ws::{DEFAULT_GATEWAY_URL, WsGateway};

/// Lifecycle signal reported by a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The session is established; `user` is the account display name.
    Ready { user: String },
    /// The session failed. `message` is raw and may contain the credential.
    Error { message: String },
    /// The peer closed the session.
    Disconnected { reason: String },
}

/// Event tagged with the attempt generation that produced it.
pub(crate) type Tagged = (u64, GatewayEvent);

/// Per-attempt handle a connection reports through.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Tagged>,
    generation: u64,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Tagged>, generation: u64) -> Self {
        Self { tx, generation }
    }

    /// Reports an event; returns `false` once the owning handle is gone.
    pub fn emit(&self, event: GatewayEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    /// Attempt generation this sink reports for.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One opaque platform session.
pub trait Connection: Send {
    /// Starts connecting; progress is reported through `sink`.
    fn connect(&mut self, sink: EventSink);

    /// Tears the session down. Safe to call more than once.
    fn close(&mut self);
}

/// Factory of connections, one per attempt.
pub trait Gateway: Send + Sync + 'static {
    /// Creates a new, not yet connected session for `credential`.
    fn open(&self, credential: &Credential) -> Box<dyn Connection>;
}
