//! # Best-effort notification delivery.
//!
//! [`Notify`] is the sink that classified connection failures are forwarded to.
//! [`WebhookNotifier`] posts `{"content": "<message>"}` to one of two
//! independently configured webhook URLs, selected by [`Channel`].
//!
//! ## Rules
//! - Delivery is **at-most-once**: no retries, no ordering guarantees.
//! - An unconfigured channel is a logged no-op, not an error.
//! - Transport failures and non-2xx responses are logged and swallowed.
//! - Callers never await delivery on their critical path; the runtime invokes
//!   the sink from a subscriber worker (see [`crate::subscribers::AlertForwarder`]).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

/// Upper bound for `content` accepted by chat webhooks.
pub const MAX_CONTENT_CHARS: usize = 2000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Notification urgency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Needs a human soon (e.g. a credential was rejected).
    Critical,
    /// Informational; usually routed to a muted channel.
    Low,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Critical => f.write_str("critical"),
            Channel::Low => f.write_str("low"),
        }
    }
}

/// Fire-and-forget notification sink.
///
/// Implementations must not panic and must not return errors: failures are
/// logged inside `notify`.
#[async_trait]
pub trait Notify: Send + Sync + 'static {
    /// Delivers `message` to `channel`, best effort.
    async fn notify(&self, channel: Channel, message: &str);
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    content: &'a str,
}

/// Posts notifications to chat webhooks over HTTP.
pub struct WebhookNotifier {
    client: reqwest::Client,
    critical: Option<String>,
    low: Option<String>,
}

impl WebhookNotifier {
    /// Creates a notifier; `None` leaves that channel unconfigured.
    pub fn new(critical: Option<String>, low: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build webhook client, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            critical: critical.filter(|u| !u.trim().is_empty()),
            low: low.filter(|u| !u.trim().is_empty()),
        }
    }

    fn url_for(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Critical => self.critical.as_deref(),
            Channel::Low => self.low.as_deref(),
        }
    }

    /// Returns whether `channel` has a destination.
    pub fn is_configured(&self, channel: Channel) -> bool {
        self.url_for(channel).is_some()
    }
}

#[async_trait]
impl Notify for WebhookNotifier {
    async fn notify(&self, channel: Channel, message: &str) {
        if message.trim().is_empty() {
            debug!(%channel, "skipping empty notification");
            return;
        }
        let Some(url) = self.url_for(channel) else {
            warn!(%channel, "no webhook configured for channel, notification dropped");
            return;
        };

        let content = truncate_chars(message, MAX_CONTENT_CHARS);
        let result = self
            .client
            .post(url)
            .json(&WebhookBody { content })
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(%channel, "notification sent");
            }
            Ok(resp) => {
                warn!(%channel, status = %resp.status(), "webhook rejected notification");
            }
            Err(e) => {
                warn!(%channel, error = %e, "failed to send notification");
            }
        }
    }
}

/// Cuts `s` to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_content_to_matching_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/critical"))
            .and(body_json(serde_json::json!({ "content": "token rejected" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/low"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(
            Some(format!("{}/critical", server.uri())),
            Some(format!("{}/low", server.uri())),
        );
        notifier.notify(Channel::Critical, "token rejected").await;
    }

    #[tokio::test]
    async fn test_unconfigured_channel_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(Some(format!("{}/critical", server.uri())), None);
        assert!(!notifier.is_configured(Channel::Low));
        notifier.notify(Channel::Low, "nobody listens").await;
    }

    #[tokio::test]
    async fn test_empty_message_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(Some(server.uri()), Some(server.uri()));
        notifier.notify(Channel::Low, "  ").await;
        notifier.notify(Channel::Critical, "").await;
    }

    #[tokio::test]
    async fn test_server_error_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(None, Some(server.uri()));
        notifier.notify(Channel::Low, "boom").await;
    }

    #[tokio::test]
    async fn test_unreachable_destination_is_swallowed() {
        // Port 9 (discard) on localhost is almost never listening.
        let notifier = WebhookNotifier::new(Some("http://127.0.0.1:9/hook".into()), None);
        notifier.notify(Channel::Critical, "boom").await;
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }
}
