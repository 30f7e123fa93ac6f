//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervisor runtime and
//! [`ReconnectMode`], which selects who drives reconnection.
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `Supervisor::builder(config)`
//! 2. **Handle actors**: each actor copies the timing knobs it needs at spawn.
//!
//! The binary fills it from flags/environment (see `cli.rs`); library users can
//! start from [`Config::default`] and override fields.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::policies::{BackoffPolicy, StaggerPolicy};

/// Who triggers reconnect attempts after the initial connect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectMode {
    /// Handles reschedule themselves after errors and disconnects.
    #[default]
    Internal,
    /// Every probe of the status endpoint sweeps all handles; nothing else
    /// reconnects automatically.
    External,
}

impl fmt::Display for ReconnectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconnectMode::Internal => f.write_str("internal"),
            ReconnectMode::External => f.write_str("external"),
        }
    }
}

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `mode`: reconnection driver (internal scheduling or external probes)
/// - `connect_timeout`: how long an attempt may stay `Connecting`
/// - `backoff`: delay growth on consecutive errors
/// - `stagger`: spreading of bulk sweeps
/// - `disconnect_delay`: pause before reconnecting after a peer close (internal mode)
/// - `grace`: maximum wait for actors to stop on shutdown
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Reconnection driver.
    pub mode: ReconnectMode,

    /// Maximum time between starting an attempt and receiving Ready/Error.
    ///
    /// When it expires the handle is forced into `Errored` with a synthetic
    /// "connection timeout" error.
    pub connect_timeout: Duration,

    /// Backoff applied to handles in `Errored`.
    pub backoff: BackoffPolicy,

    /// Stagger applied by `connect_all(stagger = true)`.
    pub stagger: StaggerPolicy,

    /// Delay before an automatic reconnect after the peer closed a healthy session.
    pub disconnect_delay: Duration,

    /// Maximum time to wait for actors to stop during shutdown.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages
    /// skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the connect timeout, treating zero as "use the default".
    #[inline]
    pub fn connect_timeout_or_default(&self) -> Duration {
        if self.connect_timeout.is_zero() {
            Config::default().connect_timeout
        } else {
            self.connect_timeout
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `mode = Internal`
    /// - `connect_timeout = 60s`
    /// - `backoff = 30s × 2^n, capped at 300s`
    /// - `stagger = 5s..15s per handle`
    /// - `disconnect_delay = 5s`
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            mode: ReconnectMode::default(),
            connect_timeout: Duration::from_secs(60),
            backoff: BackoffPolicy::default(),
            stagger: StaggerPolicy::default(),
            disconnect_delay: Duration::from_secs(5),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
        }
    }
}
