//! # Websocket gateway adapter.
//!
//! [`WsGateway`] opens one websocket session per attempt and reports only the
//! lifecycle the supervisor cares about:
//!
//! ```text
//! connect ──► Hello ──► Identify ──► heartbeat loop ──► READY    → Ready { user }
//!                                         │
//!                                         ├─ close code >= 4000 → Error { "gateway closed with code N: .." }
//!                                         ├─ other close / EOF  → Disconnected
//!                                         ├─ reconnect request  → Disconnected
//!                                         ├─ invalid session    → Error
//!                                         ├─ missed heartbeat   → Error
//!                                         └─ socket error       → Error
//! ```
//!
//! No resume, no dispatch handling beyond READY. Each session emits at most one
//! terminal event (Error or Disconnected) and then ends.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Connection, EventSink, Gateway, GatewayEvent};
use crate::credentials::Credential;

/// Discord v10 JSON gateway.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// Close codes at or above this value are application errors.
const APP_CLOSE_CODE_MIN: u16 = 4000;

#[derive(Debug, Deserialize)]
struct Payload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Gateway that opens real websocket sessions.
#[derive(Clone, Debug)]
pub struct WsGateway {
    url: Arc<str>,
}

impl WsGateway {
    /// Creates a gateway connecting to `url`.
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for WsGateway {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL)
    }
}

impl Gateway for WsGateway {
    fn open(&self, credential: &Credential) -> Box<dyn Connection> {
        Box::new(WsConnection {
            url: Arc::clone(&self.url),
            credential: credential.clone(),
            cancel: None,
            task: None,
        })
    }
}

struct WsConnection {
    url: Arc<str>,
    credential: Credential,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl Connection for WsConnection {
    fn connect(&mut self, sink: EventSink) {
        self.close();
        let cancel = CancellationToken::new();
        let url = Arc::clone(&self.url);
        let credential = self.credential.clone();
        let token = cancel.clone();
        self.task = Some(tokio::spawn(async move {
            let generation = sink.generation();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                ev = run_session(&url, &credential, &sink) => Some(ev),
            };
            match outcome {
                Some(ev) => {
                    debug!(generation, event = ?ev, "session ended");
                    sink.emit(ev);
                }
                None => debug!(generation, "session closed locally"),
            }
        }));
        self.cancel = Some(cancel);
    }

    fn close(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        // Dropping the handle detaches the task; it exits on cancellation.
        self.task = None;
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs one session until it ends; returns the terminal event.
///
/// `Ready` is reported through `sink` as soon as it arrives.
async fn run_session(url: &str, credential: &Credential, sink: &EventSink) -> GatewayEvent {
    let (ws, _) = match connect_async(url).await {
        Ok(pair) => pair,
        Err(e) => {
            return GatewayEvent::Error {
                message: e.to_string(),
            };
        }
    };
    let (mut write, mut read) = ws.split();

    let hello = match read.next().await {
        Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<Payload>(&text) {
            Ok(p) if p.op == OP_HELLO => p,
            Ok(p) => {
                return GatewayEvent::Error {
                    message: format!("expected hello, got op {}", p.op),
                };
            }
            Err(e) => {
                return GatewayEvent::Error {
                    message: format!("malformed hello: {e}"),
                };
            }
        },
        Some(Ok(WsMessage::Close(frame))) => {
            return match frame {
                Some(f) => close_event(u16::from(f.code), &f.reason),
                None => disconnected("connection closed before hello"),
            };
        }
        Some(Ok(other)) => {
            return GatewayEvent::Error {
                message: format!("unexpected message before hello: {other:?}"),
            };
        }
        Some(Err(e)) => {
            return GatewayEvent::Error {
                message: e.to_string(),
            };
        }
        None => return disconnected("connection closed before hello"),
    };

    let interval_ms = hello
        .d
        .get("heartbeat_interval")
        .and_then(Value::as_u64)
        .unwrap_or(41_250)
        .max(1);

    let identify = identify_payload(credential.expose());
    if let Err(e) = write.send(WsMessage::Text(identify.to_string().into())).await {
        return GatewayEvent::Error {
            message: format!("failed to send identify: {e}"),
        };
    }

    let mut sequence: Option<u64> = None;
    let mut acked = true;
    let mut heartbeat = tokio::time::interval(Duration::from_millis(interval_ms));
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !acked {
                    return GatewayEvent::Error { message: "heartbeat not acknowledged".into() };
                }
                let beat = json!({ "op": OP_HEARTBEAT, "d": sequence });
                if let Err(e) = write.send(WsMessage::Text(beat.to_string().into())).await {
                    return GatewayEvent::Error { message: format!("failed to send heartbeat: {e}") };
                }
                acked = false;
            }
            msg = read.next() => {
                let text = match msg {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(Some(frame)))) => {
                        return close_event(u16::from(frame.code), &frame.reason);
                    }
                    Some(Ok(WsMessage::Close(None))) | None => {
                        return disconnected("connection closed");
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return GatewayEvent::Error { message: e.to_string() },
                };
                let payload = match serde_json::from_str::<Payload>(&text) {
                    Ok(p) => p,
                    Err(e) => {
                        debug!(error = %e, "ignoring unparsable payload");
                        continue;
                    }
                };
                if payload.s.is_some() {
                    sequence = payload.s;
                }
                match payload.op {
                    OP_DISPATCH if payload.t.as_deref() == Some("READY") => {
                        let user = ready_user(&payload.d).unwrap_or_default();
                        info!(generation = sink.generation(), "gateway ready");
                        sink.emit(GatewayEvent::Ready { user });
                    }
                    OP_HEARTBEAT_ACK => acked = true,
                    OP_HEARTBEAT => {
                        let beat = json!({ "op": OP_HEARTBEAT, "d": sequence });
                        if let Err(e) = write.send(WsMessage::Text(beat.to_string().into())).await {
                            return GatewayEvent::Error { message: format!("failed to send heartbeat: {e}") };
                        }
                    }
                    OP_RECONNECT => return disconnected("gateway requested reconnect"),
                    OP_INVALID_SESSION => {
                        return GatewayEvent::Error { message: "invalid session".into() };
                    }
                    _ => {}
                }
            }
        }
    }
}

fn disconnected(reason: &str) -> GatewayEvent {
    GatewayEvent::Disconnected {
        reason: reason.to_string(),
    }
}

/// Maps a close frame to a terminal event.
fn close_event(code: u16, reason: &str) -> GatewayEvent {
    if code >= APP_CLOSE_CODE_MIN {
        GatewayEvent::Error {
            message: format!("gateway closed with code {code}: {reason}"),
        }
    } else {
        GatewayEvent::Disconnected {
            reason: format!("closed by peer ({code})"),
        }
    }
}

/// Extracts the display name from a READY payload.
fn ready_user(d: &Value) -> Option<String> {
    d.get("user")?
        .get("username")?
        .as_str()
        .map(str::to_string)
}

fn identify_payload(token: &str) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": 0,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "linkvisor",
                "device": "linkvisor",
            },
        },
    })
}
