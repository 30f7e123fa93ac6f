//! # ConnectionHandle: per-account supervision record.
//!
//! Pure state machine; no I/O and no timers. The owning [`HandleActor`](super::actor)
//! drives it and publishes the matching events.
//!
//! ```text
//!                 begin_connect                mark_ready
//!  Disconnected ───────────────► Connecting ───────────────► Connected
//!       ▲                         │    ▲                        │
//!       │                         │    │ begin_connect          │ mark_disconnected
//!       │            mark_errored │    │                        ▼
//!       │                         ▼    │                   Disconnected
//!       │                        Errored                        │
//!       └───────────────────────────────── begin_connect ◄──────┘
//! ```
//!
//! ## Rules
//! - `attempt` increments on every `begin_connect` and never resets.
//! - `mark_ready` clears `consecutive_errors`, `backoff` and `last_error`.
//! - `mark_errored` bumps both error counters and recomputes `backoff` from
//!   the consecutive count.
//! - The credential is only ever exposed in masked form by [`HandleStatus`].

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{Classification, ErrorKind};
use crate::credentials::Credential;
use crate::policies::BackoffPolicy;

/// Lifecycle state of one handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl HandleState {
    /// Returns a short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            HandleState::Disconnected => "disconnected",
            HandleState::Connecting => "connecting",
            HandleState::Connected => "connected",
            HandleState::Errored => "errored",
        }
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Supervision record for one configured credential.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: usize,
    credential: Credential,
    identity: Option<String>,
    state: HandleState,
    error_count: u64,
    consecutive_errors: u32,
    last_error: Option<Classification>,
    last_error_at: Option<DateTime<Utc>>,
    backoff: Duration,
    last_reconnect_at: Option<DateTime<Utc>>,
    next_reconnect_at: Option<DateTime<Utc>>,
    attempt: u64,
}

impl ConnectionHandle {
    /// Creates a handle in `Disconnected`.
    pub fn new(id: usize, credential: Credential) -> Self {
        Self {
            id,
            credential,
            identity: None,
            state: HandleState::Disconnected,
            error_count: 0,
            consecutive_errors: 0,
            last_error: None,
            last_error_at: None,
            backoff: Duration::ZERO,
            last_reconnect_at: None,
            next_reconnect_at: None,
            attempt: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn last_error(&self) -> Option<&Classification> {
        self.last_error.as_ref()
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Current attempt generation (0 before the first attempt).
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Delay a connect request must honour before starting an attempt.
    ///
    /// Non-zero only while `Errored` with a pending backoff.
    pub fn reconnect_delay(&self) -> Duration {
        if self.state == HandleState::Errored {
            self.backoff
        } else {
            Duration::ZERO
        }
    }

    /// Records when the next attempt is due (`None` clears it).
    pub fn set_next_reconnect(&mut self, at: Option<DateTime<Utc>>) {
        self.next_reconnect_at = at;
    }

    /// Enters `Connecting` and returns the new attempt generation.
    pub fn begin_connect(&mut self, now: DateTime<Utc>) -> u64 {
        self.attempt += 1;
        self.state = HandleState::Connecting;
        self.last_reconnect_at = Some(now);
        self.next_reconnect_at = None;
        self.attempt
    }

    /// Enters `Connected`. An empty `user` keeps the previously known identity.
    pub fn mark_ready(&mut self, user: &str) {
        self.state = HandleState::Connected;
        if !user.is_empty() {
            self.identity = Some(user.to_string());
        }
        self.consecutive_errors = 0;
        self.backoff = Duration::ZERO;
        self.last_error = None;
    }

    /// Enters `Errored` and returns the recomputed backoff.
    pub fn mark_errored(
        &mut self,
        error: Classification,
        policy: &BackoffPolicy,
        now: DateTime<Utc>,
    ) -> Duration {
        self.state = HandleState::Errored;
        self.error_count = self.error_count.saturating_add(1);
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.backoff = policy.for_errors(self.consecutive_errors);
        self.last_error = Some(error);
        self.last_error_at = Some(now);
        self.backoff
    }

    /// Enters `Disconnected` after the peer closed a healthy session.
    pub fn mark_disconnected(&mut self) {
        self.state = HandleState::Disconnected;
    }

    /// Read-only view safe to expose over HTTP.
    pub fn status(&self) -> HandleStatus {
        HandleStatus {
            id: self.id,
            identity: self.identity.clone(),
            state: self.state,
            error_count: self.error_count,
            consecutive_errors: self.consecutive_errors,
            last_error: self.last_error.as_ref().map(|e| e.message.clone()),
            last_error_kind: self.last_error.as_ref().map(|e| e.kind),
            last_error_at: self.last_error_at,
            backoff_ms: duration_ms(self.backoff),
            last_reconnect_at: self.last_reconnect_at,
            next_reconnect_at: self.next_reconnect_at,
            attempt: self.attempt,
            credential: self.credential.masked().to_string(),
        }
    }
}

/// Snapshot of one handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HandleStatus {
    pub id: usize,
    pub identity: Option<String>,
    pub state: HandleState,
    pub error_count: u64,
    pub consecutive_errors: u32,
    /// Masked.
    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub backoff_ms: u64,
    pub last_reconnect_at: Option<DateTime<Utc>>,
    pub next_reconnect_at: Option<DateTime<Utc>>,
    pub attempt: u64,
    /// Masked.
    pub credential: String,
}

impl HandleStatus {
    /// Identity, or `#id` when the account never reached Ready.
    pub fn display_name(&self) -> String {
        match &self.identity {
            Some(name) => name.clone(),
            None => format!("#{}", self.id),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    fn handle() -> ConnectionHandle {
        ConnectionHandle::new(0, Credential::new("abcd1234efgh5678", 0).unwrap())
    }

    fn err(h: &ConnectionHandle, text: &str) -> Classification {
        classify(text, h.credential())
    }

    #[test]
    fn test_backoff_grows_then_resets_on_ready() {
        let policy = BackoffPolicy::default();
        let mut h = handle();
        let now = Utc::now();

        for k in 1..=3u32 {
            h.begin_connect(now);
            let e = err(&h, "HTTP 429");
            let backoff = h.mark_errored(e, &policy, now);
            assert_eq!(h.state(), HandleState::Errored);
            assert_eq!(h.consecutive_errors(), k);
            assert_eq!(backoff, policy.for_errors(k));
        }
        assert_eq!(h.backoff().as_millis(), 120_000);
        assert_eq!(h.reconnect_delay().as_millis(), 120_000);

        assert_eq!(h.begin_connect(now), 4);
        assert_eq!(h.reconnect_delay(), Duration::ZERO);
        h.mark_ready("bot");
        assert_eq!(h.state(), HandleState::Connected);
        assert_eq!(h.identity(), Some("bot"));
        assert_eq!(h.consecutive_errors(), 0);
        assert_eq!(h.backoff(), Duration::ZERO);
        assert!(h.last_error().is_none());
        assert_eq!(h.error_count(), 3);
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let policy = BackoffPolicy::default();
        let mut h = handle();
        let now = Utc::now();
        for _ in 0..8 {
            h.begin_connect(now);
            let e = err(&h, "boom");
            h.mark_errored(e, &policy, now);
        }
        assert_eq!(h.backoff(), Duration::from_secs(300));
    }

    #[test]
    fn test_disconnect_keeps_identity() {
        let mut h = handle();
        h.begin_connect(Utc::now());
        h.mark_ready("bot");
        h.mark_disconnected();
        assert_eq!(h.state(), HandleState::Disconnected);
        h.begin_connect(Utc::now());
        h.mark_ready("");
        assert_eq!(h.identity(), Some("bot"));
    }

    #[test]
    fn test_status_is_masked() {
        let policy = BackoffPolicy::default();
        let mut h = handle();
        h.begin_connect(Utc::now());
        let e = err(&h, "Invalid token abcd1234efgh5678");
        h.mark_errored(e, &policy, Utc::now());

        let status = h.status();
        assert_eq!(status.credential, "abcd1234...5678");
        assert_eq!(status.last_error_kind, Some(ErrorKind::AuthFailure));
        assert_eq!(status.backoff_ms, 30_000);
        assert_eq!(status.display_name(), "#0");
        let json = serde_json::to_string(&status).unwrap();
        assert!(!json.contains("abcd1234efgh5678"));
    }
}
