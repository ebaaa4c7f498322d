use std::sync::Arc;
use std::time::Duration;
use tandem::constants::{CLIENT_IDLE_TIMEOUT, HEARTBEAT_INTERVAL};
use tandem::discovery::{Discovery, HostInfo};

/// Settings for an [`crate::RpcServer`].
#[derive(Clone)]
pub struct RpcServerConfig {
    /// Registry center every method is advertised to. `None` disables
    /// advertising.
    pub discovery: Option<Arc<dyn Discovery>>,
    /// Address advertised to the registry center. Defaults to the address
    /// the listener is bound to.
    pub advertised_host: Option<HostInfo>,
    /// How often the server pings each connection.
    pub heartbeat_interval: Duration,
    /// How long the server waits for any frame (including Pong) before
    /// dropping the connection.
    pub idle_timeout: Duration,
}

impl RpcServerConfig {
    /// Enables advertising through `discovery`.
    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_advertised_host(mut self, host: HostInfo) -> Self {
        self.advertised_host = Some(host);
        self
    }
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            discovery: None,
            advertised_host: None,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            idle_timeout: CLIENT_IDLE_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for RpcServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServerConfig")
            .field("discovery", &self.discovery.is_some())
            .field("advertised_host", &self.advertised_host)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}
