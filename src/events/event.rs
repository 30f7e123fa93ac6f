//! # Runtime events emitted by the supervisor and handle actors.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Handle lifecycle**: connect requests, attempts, ready, errors, timeouts, disconnects
//! - **Supervisor**: sweeps, shutdown progress
//! - **Subscriber health**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries metadata such as timestamps, handle id, masked
//! error text and scheduling delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Events for one handle are published from that handle's actor
//! only, so they are emitted in transition order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::{ErrorKind, Event, EventKind};
//!
//! let ev = Event::new(EventKind::Errored)
//!     .with_handle(2)
//!     .with_error_kind(ErrorKind::RateLimited)
//!     .with_reason("HTTP 429")
//!     .with_delay(Duration::from_secs(60));
//!
//! assert_eq!(ev.kind, EventKind::Errored);
//! assert_eq!(ev.handle, Some(2));
//! assert_eq!(ev.delay_ms, Some(60_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::classify::ErrorKind;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic info
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and drop cause
    SubscriberOverflow,

    // === Supervisor events ===
    /// A bulk connect sweep was requested.
    ///
    /// Sets:
    /// - `attempt`: sweep number (1-based, process lifetime)
    /// - `reason`: `"staggered"` or `"immediate"`
    SweepRequested,

    /// Shutdown requested (OS signal observed or token cancelled).
    ShutdownRequested,

    /// All handle actors stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some actors did not stop in time.
    GraceExceeded,

    // === Handle lifecycle events ===
    /// A connect attempt was scheduled for a handle.
    ///
    /// Sets:
    /// - `handle`: handle id
    /// - `delay_ms`: delay before the attempt
    ConnectRequested,

    /// Additional backoff delay applied before the next attempt.
    ///
    /// Sets:
    /// - `handle`: handle id
    /// - `delay_ms`: backoff delay
    /// - `consecutive`: consecutive errors that produced it
    BackoffScheduled,

    /// A live session was closed before a fresh attempt.
    ///
    /// Sets:
    /// - `handle`: handle id
    /// - `identity`: account display name, if known
    SessionTornDown,

    /// A connect attempt started; the handle is `Connecting`.
    ///
    /// Sets:
    /// - `handle`: handle id
    /// - `attempt`: attempt number (1-based, per handle)
    /// - `timeout_ms`: connect timer duration
    Connecting,

    /// The session reported Ready; the handle is `Connected`.
    ///
    /// Sets:
    /// - `handle`: handle id
    /// - `attempt`: attempt number
    /// - `identity`: account display name
    Ready,

    /// The session reported an error (or timed out); the handle is `Errored`.
    ///
    /// Sets:
    /// - `handle`: handle id
    /// - `attempt`: attempt number
    /// - `identity`: account display name, if known
    /// - `error_kind`: classification
    /// - `reason`: masked error text
    /// - `consecutive`: consecutive error count
    /// - `delay_ms`: resulting backoff
    Errored,

    /// The connect timer fired while the handle was still `Connecting`.
    ///
    /// Always followed by `Errored` with `error_kind = ConnectionTimeout`.
    ///
    /// Sets:
    /// - `handle`: handle id
    /// - `attempt`: attempt number
    /// - `timeout_ms`: connect timer duration
    TimeoutHit,

    /// The peer closed a healthy session; the handle is `Disconnected`.
    ///
    /// Sets:
    /// - `handle`: handle id
    /// - `identity`: account display name, if known
    /// - `reason`: close reason
    Disconnected,
}

/// Runtime event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique sequence number (monotonic).
    pub seq: u64,
    /// Wall-clock timestamp when the event was created.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Handle id, if the event concerns one handle.
    pub handle: Option<usize>,
    /// Account display name, if known.
    pub identity: Option<Arc<str>>,
    /// Attempt or sweep number.
    pub attempt: Option<u64>,
    /// Masked human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Error classification.
    pub error_kind: Option<ErrorKind>,
    /// Consecutive error count.
    pub consecutive: Option<u32>,
    /// Scheduling delay in milliseconds.
    pub delay_ms: Option<u64>,
    /// Connect timer duration in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            handle: None,
            identity: None,
            attempt: None,
            reason: None,
            error_kind: None,
            consecutive: None,
            delay_ms: None,
            timeout_ms: None,
        }
    }

    /// Attaches a handle id.
    #[inline]
    pub fn with_handle(mut self, id: usize) -> Self {
        self.handle = Some(id);
        self
    }

    /// Attaches an account display name.
    #[inline]
    pub fn with_identity(mut self, identity: impl Into<Arc<str>>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Attaches an account display name when one is known.
    #[inline]
    pub fn with_identity_opt(self, identity: Option<&str>) -> Self {
        match identity {
            Some(name) => self.with_identity(name),
            None => self,
        }
    }

    /// Attaches an attempt (or sweep) number.
    #[inline]
    pub fn with_attempt(mut self, n: u64) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a human-readable reason. Callers must pass masked text.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an error classification.
    #[inline]
    pub fn with_error_kind(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }

    /// Attaches a consecutive error count.
    #[inline]
    pub fn with_consecutive(mut self, n: u32) -> Self {
        self.consecutive = Some(n);
        self
    }

    /// Attaches a scheduling delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}
