//! Scripted in-memory gateway for driving handle actors in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Connection, EventSink, Gateway, GatewayEvent};
use crate::credentials::Credential;

/// What a fresh connection does as soon as it is started.
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Emits nothing; the test drives it through [`FakeGateway::emit`].
    Silent,
    /// Emits `Ready { user }` immediately.
    Ready(String),
    /// Emits `Error { message }` immediately.
    Fail(String),
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, Script>,
    sinks: HashMap<String, EventSink>,
    opened: HashMap<String, usize>,
    connects: HashMap<String, usize>,
    closes: HashMap<String, usize>,
}

/// Gateway whose connections are controlled by the test.
#[derive(Clone, Default)]
pub(crate) struct FakeGateway {
    state: Arc<Mutex<State>>,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets the behaviour of future connections for `raw` credential.
    pub(crate) fn script(&self, raw: &str, script: Script) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(raw.to_string(), script);
    }

    /// Emits through the most recent sink of `raw`; false if none or closed.
    pub(crate) fn emit(&self, raw: &str, event: GatewayEvent) -> bool {
        let sink = self.state.lock().unwrap().sinks.get(raw).cloned();
        sink.is_some_and(|s| s.emit(event))
    }

    /// Returns the most recent sink handed to a connection for `raw`.
    pub(crate) fn sink(&self, raw: &str) -> Option<EventSink> {
        self.state.lock().unwrap().sinks.get(raw).cloned()
    }

    pub(crate) fn opened(&self, raw: &str) -> usize {
        *self.state.lock().unwrap().opened.get(raw).unwrap_or(&0)
    }

    pub(crate) fn connects(&self, raw: &str) -> usize {
        *self.state.lock().unwrap().connects.get(raw).unwrap_or(&0)
    }

    pub(crate) fn closes(&self, raw: &str) -> usize {
        *self.state.lock().unwrap().closes.get(raw).unwrap_or(&0)
    }
}

impl Gateway for FakeGateway {
    fn open(&self, credential: &Credential) -> Box<dyn Connection> {
        let key = credential.expose().to_string();
        *self
            .state
            .lock()
            .unwrap()
            .opened
            .entry(key.clone())
            .or_default() += 1;
        Box::new(FakeConnection {
            key,
            state: Arc::clone(&self.state),
            closed: false,
        })
    }
}

struct FakeConnection {
    key: String,
    state: Arc<Mutex<State>>,
    closed: bool,
}

impl Connection for FakeConnection {
    fn connect(&mut self, sink: EventSink) {
        let script = {
            let mut st = self.state.lock().unwrap();
            *st.connects.entry(self.key.clone()).or_default() += 1;
            st.sinks.insert(self.key.clone(), sink.clone());
            st.scripts.get(&self.key).cloned().unwrap_or(Script::Silent)
        };
        match script {
            Script::Silent => {}
            Script::Ready(user) => {
                sink.emit(GatewayEvent::Ready { user });
            }
            Script::Fail(message) => {
                sink.emit(GatewayEvent::Error { message });
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        *self
            .state
            .lock()
            .unwrap()
            .closes
            .entry(self.key.clone())
            .or_default() += 1;
    }
}
