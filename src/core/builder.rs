use std::sync::Arc;

use crate::{
    config::Config,
    credentials::Credential,
    error::ConfigError,
    events::Bus,
    gateway::{Gateway, WsGateway},
    subscribers::{Subscribe, SubscriberSet},
};

use super::supervisor::Supervisor;

/// Builder for constructing a Supervisor with optional collaborators.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    gateway: Option<Arc<dyn Gateway>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            gateway: None,
        }
    }

    /// Sets event subscribers (logging, alerting, ...).
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the gateway connections are opened through.
    ///
    /// Defaults to [`WsGateway`] on the default gateway URL.
    pub fn with_gateway(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Creates one handle per credential (in order) and spawns their actors.
    ///
    /// Must be called from within a Tokio runtime. No connection is attempted
    /// until [`Supervisor::connect_all`] or [`Supervisor::connect_one`].
    ///
    /// # Errors
    /// [`ConfigError::NoCredentials`] when `credentials` is empty.
    pub fn initialize(self, credentials: Vec<Credential>) -> Result<Arc<Supervisor>, ConfigError> {
        if credentials.is_empty() {
            return Err(ConfigError::NoCredentials);
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, Some(bus.clone())));
        let gateway = self
            .gateway
            .unwrap_or_else(|| Arc::new(WsGateway::default()));

        let sup = Supervisor::new_internal(self.cfg, bus, subs, gateway, credentials);
        Ok(Arc::new(sup))
    }
}
