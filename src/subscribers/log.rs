//! # LogWriter: structured event logger
//!
//! A subscriber that turns incoming [`Event`]s into `tracing` records under the
//! `linkvisor::events` target.
//!
//! ## Example output
//! ```text
//! INFO  connecting handle=0 attempt=1 timeout_ms=60000
//! INFO  ready handle=0 identity="bot-one" attempt=1
//! WARN  errored handle=1 kind=rate_limited reason="HTTP 429" consecutive=2 backoff_ms=60000
//! WARN  timeout handle=2 attempt=1 timeout_ms=60000
//! INFO  disconnected handle=0 identity="bot-one" reason="closed by peer (1000)"
//! INFO  sweep requested sweep=3 mode="staggered"
//! ERROR grace exceeded
//! ```
//!
//! Reasons carried by events are already masked; this subscriber never sees a
//! raw credential.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "linkvisor::events";

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
        let identity = e.identity.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ConnectRequested => {
                debug!(target: TARGET, handle = ?e.handle, delay_ms = ?e.delay_ms, "connect requested");
            }
            EventKind::BackoffScheduled => {
                info!(
                    target: TARGET,
                    handle = ?e.handle,
                    delay_ms = ?e.delay_ms,
                    consecutive = ?e.consecutive,
                    "backoff applied"
                );
            }
            EventKind::SessionTornDown => {
                info!(target: TARGET, handle = ?e.handle, identity, "session torn down for reconnect");
            }
            EventKind::Connecting => {
                info!(
                    target: TARGET,
                    handle = ?e.handle,
                    attempt = ?e.attempt,
                    timeout_ms = ?e.timeout_ms,
                    "connecting"
                );
            }
            EventKind::Ready => {
                info!(target: TARGET, handle = ?e.handle, identity, attempt = ?e.attempt, "ready");
            }
            EventKind::Errored => {
                let kind = e.error_kind.map(|k| k.as_label()).unwrap_or("unknown");
                warn!(
                    target: TARGET,
                    handle = ?e.handle,
                    identity,
                    kind,
                    reason,
                    consecutive = ?e.consecutive,
                    backoff_ms = ?e.delay_ms,
                    "errored"
                );
            }
            EventKind::TimeoutHit => {
                warn!(
                    target: TARGET,
                    handle = ?e.handle,
                    attempt = ?e.attempt,
                    timeout_ms = ?e.timeout_ms,
                    "timeout"
                );
            }
            EventKind::Disconnected => {
                info!(target: TARGET, handle = ?e.handle, identity, reason, "disconnected");
            }
            EventKind::SweepRequested => {
                info!(target: TARGET, sweep = ?e.attempt, mode = reason, "sweep requested");
            }
            EventKind::ShutdownRequested => {
                info!(target: TARGET, "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!(target: TARGET, "all handles stopped within grace");
            }
            EventKind::GraceExceeded => {
                error!(target: TARGET, reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: TARGET, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
