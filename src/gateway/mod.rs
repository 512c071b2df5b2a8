//! Gateway module - UDP transport and protocol dispatch
//!
//! Provides:
//! - Dispatcher implementing the per-message protocol state machine
//! - Gateway server owning the UDP socket and the receive loop

mod dispatcher;
mod server;

pub use dispatcher::*;
pub use server::*;

use crate::protocol::DEFAULT_ENDPOINT;

/// Configuration for the gateway server
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Discovery endpoint to listen on, `address:port`; broadcast or
    /// multicast addresses are both accepted
    pub endpoint: String,
    /// Create/update visible devices from presentation and set messages
    pub auto_create: bool,
    /// Gateway name, used as the prefix for auto-created device names
    pub name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auto_create: false,
            name: "SensorNet".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
