//! # linkvisor
//!
//! **Linkvisor** keeps long-lived gateway websocket sessions of several
//! accounts alive. It reconnects them on failure (with backoff) or on an
//! external trigger, classifies their errors, forwards the ones that matter
//! to a notification webhook and exposes a small HTTP status surface.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     credentials (TOKENS / TOKEN)
//!            │ parse_credentials
//!            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - ConnectionHandle[0..N] (Arc<RwLock>, read by status snapshots) │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to subscribers)                        │
//! └──────┬──────────────────┬──────────────────┬───────────────▲──────┘
//!        ▼                  ▼                  ▼               │ connect_all / status
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ HandleActor  │   │ HandleActor  │   │ HandleActor  │   HTTP (axum)
//!     │  #0          │   │  #1          │   │  #N-1        │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ Gateway::open / Connection::connect(EventSink)
//!      ▼
//!   (generation, GatewayEvent) ──► classify ──► ConnectionHandle transitions
//!                                                 │
//!                                                 ▼ publish
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                            SubscriberSet
//!                         ┌─────────┴─────────┐
//!                         ▼                   ▼
//!                     LogWriter         AlertForwarder ──► Notify (webhooks)
//! ```
//!
//! ### Lifecycle of one handle
//! ```text
//! Disconnected ─► Connecting ─┬─► Connected ─► (peer close) ─► Disconnected
//!                     ▲       ├─► Errored   (error, classified)
//!                     │       └─► Errored   (connect timer expired)
//!                     └──── next attempt (after backoff while Errored)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Handles, sweeps, per-handle reconnects, status snapshots.     | [`Supervisor`], [`StatusSnapshot`]          |
//! | **Credentials**   | List parsing and masking.                                     | [`Credential`], [`parse_credentials`]       |
//! | **Classification**| Error text to kind + masked description.                      | [`classify`], [`ErrorKind`]                 |
//! | **Notification**  | Best-effort two-channel webhook delivery.                     | [`Notify`], [`WebhookNotifier`]             |
//! | **Gateway seam**  | Opaque platform sessions.                                     | [`Gateway`], [`Connection`], [`WsGateway`]  |
//! | **Subscriber API**| Hook into lifecycle events.                                   | [`Subscribe`], [`LogWriter`], [`AlertForwarder`] |
//! | **Policies**      | Backoff and stagger timing.                                   | [`BackoffPolicy`], [`StaggerPolicy`]        |
//! | **Errors**        | Typed errors.                                                 | [`ConfigError`], [`RuntimeError`]           |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use linkvisor::{
//!     AlertForwarder, Config, LogWriter, Subscribe, Supervisor, WebhookNotifier, parse_credentials,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = parse_credentials(Some("tokA,tokB"), None)?;
//!     let notifier = Arc::new(WebhookNotifier::new(
//!         Some("https://example.invalid/critical".into()),
//!         None,
//!     ));
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![
//!         Arc::new(LogWriter::new()),
//!         Arc::new(AlertForwarder::new(notifier)),
//!     ];
//!
//!     let sup = Supervisor::builder(Config::default())
//!         .with_subscribers(subs)
//!         .initialize(credentials)?;
//!     sup.connect_all(true);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     linkvisor::http::serve(listener, Arc::clone(&sup), async {
//!         let _ = linkvisor::wait_for_shutdown_signal().await;
//!     })
//!     .await?;
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod classify;
mod config;
mod core;
mod credentials;
mod error;
mod events;
mod notify;
mod policies;
mod subscribers;

pub mod cli;
pub mod gateway;
pub mod http;

// ---- Public re-exports ----

pub use classify::{CONNECTION_TIMEOUT_MESSAGE, Classification, ErrorKind, classify};
pub use config::{Config, ReconnectMode};
pub use crate::core::{
    ConnectionHandle, HandleState, HandleStatus, StatusSnapshot, Supervisor, SupervisorBuilder,
    wait_for_shutdown_signal,
};
pub use credentials::{Credential, parse_credentials};
pub use error::{ConfigError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use gateway::{Connection, EventSink, Gateway, GatewayEvent, WsGateway};
pub use notify::{Channel, MAX_CONTENT_CHARS, Notify, WebhookNotifier};
pub use policies::{BackoffPolicy, StaggerPolicy};
pub use subscribers::{AlertForwarder, LogWriter, Subscribe, SubscriberSet};
