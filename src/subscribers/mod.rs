//! # Event subscribers for the linkvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and built-in implementations for handling runtime events broadcast through
//! the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   HandleActor ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                        │
//!                                                              ┌─────────┼─────────┐
//!                                                              ▼         ▼         ▼
//!                                                          LogWriter  AlertForwarder  Custom
//! ```
//!
//! ## Built-in subscribers
//! - [`LogWriter`] writes every event as a structured `tracing` record.
//! - [`AlertForwarder`] forwards classified failures to a [`Notify`](crate::notify::Notify) sink.

mod alert;
mod log;
mod set;
mod subscriber;

pub use alert::AlertForwarder;
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
