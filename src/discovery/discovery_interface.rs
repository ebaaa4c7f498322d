use super::{DiscoveryError, HostInfo};
use tokio::sync::broadcast;

/// A change in the set of hosts providing one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceChange {
    Online(HostInfo),
    Offline(HostInfo),
}

/// Capability offered by a registry center.
///
/// Servers advertise each method they expose under the method's name;
/// clients resolve a method name to the hosts that currently provide it and
/// follow changes through [`Discovery::subscribe`].
#[async_trait::async_trait]
pub trait Discovery: Send + Sync {
    async fn register_service(&self, service: &str, host: &HostInfo)
    -> Result<(), DiscoveryError>;

    async fn unregister_service(
        &self,
        service: &str,
        host: &HostInfo,
    ) -> Result<(), DiscoveryError>;

    async fn resolve(&self, service: &str) -> Result<Vec<HostInfo>, DiscoveryError>;

    async fn subscribe(
        &self,
        service: &str,
    ) -> Result<broadcast::Receiver<ServiceChange>, DiscoveryError>;
}
