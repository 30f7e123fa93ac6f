//! Runtime core: handles, actors and orchestration.
//!
//! The public API from this module is [`Supervisor`] (with its builder and
//! status types), which owns the connection handles, schedules connect
//! attempts and drives graceful shutdown.
//!
//! Internal modules:
//! - [`handle`]: per-account state machine and its read-only status view;
//! - [`actor`]: owns one handle's session, timers and transitions;
//! - [`supervisor`]: spawns actors, sweeps, snapshots, shutdown;
//! - [`builder`]: wires bus, subscribers and gateway together;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod actor;
mod builder;
mod handle;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use handle::{ConnectionHandle, HandleState, HandleStatus};
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::{StatusSnapshot, Supervisor};
