//! Reconnect scheduling policies.
//!
//! This module groups the knobs that control **when** a handle connects again.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the delay grows with consecutive errors (first / factor / max)
//! - [`StaggerPolicy`] how a bulk sweep spreads connect attempts over time
//!
//! ## Quick wiring
//! ```text
//! Supervisor::connect_all(stagger)
//!      └─► StaggerPolicy::delays(n, stagger)   one delay per handle
//!           └─► HandleActor (per handle):
//!                - waits its stagger delay
//!                - if Errored, additionally waits BackoffPolicy::for_errors(consecutive)
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=30s, factor=2.0, max=300s.
//! - `StaggerPolicy::default()` → step in [5s, 15s].

mod backoff;
mod stagger;

pub use backoff::BackoffPolicy;
pub use stagger::StaggerPolicy;
