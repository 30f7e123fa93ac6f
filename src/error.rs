//! Error types used by the linkvisor runtime.
//!
//! This module defines two main error enums:
//!
//! - [`ConfigError`]: startup failures; the process must not start.
//! - [`RuntimeError`]: errors raised by the supervisor while it runs.
//!
//! Connection-level failures are **not** errors in this sense: they are absorbed
//! at the handle boundary, classified (see [`crate::classify`]) and surfaced as
//! events. Both enums provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while reading configuration.
///
/// All variants are fatal: the supervisor refuses to start without a usable
/// credential list.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither the credential list nor the legacy single credential yielded anything.
    #[error("no credentials configured (set TOKENS or TOKEN)")]
    NoCredentials,

    /// A credential entry was present but unusable.
    #[error("credential #{index} is malformed: {reason}")]
    MalformedCredential {
        /// Position of the entry in the parsed list.
        index: usize,
        /// What was wrong with it (never contains the raw value).
        reason: &'static str,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use linkvisor::ConfigError;
    ///
    /// assert_eq!(ConfigError::NoCredentials.as_label(), "config_no_credentials");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NoCredentials => "config_no_credentials",
            ConfigError::MalformedCredential { .. } => "config_malformed_credential",
        }
    }
}

/// # Errors produced by the supervisor runtime.
///
/// None of these are fatal for the process; callers report them and move on.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A handle id outside `0..len` was requested.
    #[error("no connection handle with id {id} (have {len})")]
    InvalidHandle {
        /// Requested id.
        id: usize,
        /// Number of handles the supervisor owns.
        len: usize,
    },

    /// The handle's actor is no longer running (runtime is shutting down).
    #[error("connection handle {id} is closed")]
    HandleClosed {
        /// Handle id.
        id: usize,
    },

    /// Shutdown grace period was exceeded; some actors did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck handles: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of the handles whose actors were still running.
        stuck: Vec<usize>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use linkvisor::RuntimeError;
    ///
    /// let err = RuntimeError::InvalidHandle { id: 7, len: 2 };
    /// assert_eq!(err.as_label(), "runtime_invalid_handle");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidHandle { .. } => "runtime_invalid_handle",
            RuntimeError::HandleClosed { .. } => "runtime_handle_closed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}
