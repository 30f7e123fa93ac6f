//! # AlertForwarder: routes classified failures to a notification sink.
//!
//! Listens for `EventKind::Errored` and forwards a one-line summary to the
//! channel chosen by the event's [`ErrorKind`]:
//!
//! ```text
//! AuthFailure                                  → Critical
//! RateLimited | NetworkUnreachable |
//! ConnectionTimeout | Unknown                  → Low
//! BenignInternal                               → (nothing)
//! ```
//!
//! Delivery runs on this subscriber's worker, so a slow webhook only fills this
//! subscriber's queue and never delays a handle actor.

use std::sync::Arc;

use async_trait::async_trait;

use crate::classify::{Classification, ErrorKind};
use crate::events::{Event, EventKind};
use crate::notify::Notify;
use crate::subscribers::Subscribe;

/// Forwards `Errored` events to a [`Notify`] sink.
pub struct AlertForwarder {
    sink: Arc<dyn Notify>,
}

impl AlertForwarder {
    /// Creates a forwarder delivering to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn Notify>) -> Self {
        Self { sink }
    }
}

/// Builds the notification text for an `Errored` event.
fn alert_message(ev: &Event, kind: ErrorKind) -> String {
    let account = match (ev.identity.as_deref(), ev.handle) {
        (Some(name), _) => name.to_string(),
        (None, Some(id)) => format!("#{id}"),
        (None, None) => "#?".to_string(),
    };
    let description = Classification {
        kind,
        message: ev.reason.as_deref().unwrap_or_default().to_string(),
    }
    .describe();
    format!("Account: {account} {description}")
}

#[async_trait]
impl Subscribe for AlertForwarder {
    async fn on_event(&self, ev: &Event) {
        if ev.kind != EventKind::Errored {
            return;
        }
        let kind = ev.error_kind.unwrap_or(ErrorKind::Unknown);
        let Some(channel) = kind.channel() else {
            return;
        };
        self.sink.notify(channel, &alert_message(ev, kind)).await;
    }

    fn name(&self) -> &'static str {
        "alert-forwarder"
    }

    fn queue_capacity(&self) -> usize {
        256
    }
}
