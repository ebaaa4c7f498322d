use super::{Discovery, DiscoveryError, HostInfo, ServiceChange};
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};

/// Number of change notifications buffered per service before slow
/// subscribers start lagging.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

struct ServiceEntry {
    hosts: Vec<HostInfo>,
    changes: broadcast::Sender<ServiceChange>,
}

impl ServiceEntry {
    fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            hosts: Vec::new(),
            changes,
        }
    }
}

/// A registry center living inside the process.
///
/// Stands in for an external discovery service in tests and single-process
/// deployments.
#[derive(Default)]
pub struct InMemoryRegistryCenter {
    services: RwLock<HashMap<String, ServiceEntry>>,
}

impl InMemoryRegistryCenter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Discovery for InMemoryRegistryCenter {
    async fn register_service(
        &self,
        service: &str,
        host: &HostInfo,
    ) -> Result<(), DiscoveryError> {
        let mut services = self.services.write().await;
        let entry = services
            .entry(service.to_owned())
            .or_insert_with(ServiceEntry::new);

        if entry.hosts.contains(host) {
            return Ok(());
        }
        entry.hosts.push(host.clone());
        tracing::info!("Service {} online at {}", service, host);
        // No subscribers is not an error.
        let _ = entry.changes.send(ServiceChange::Online(host.clone()));
        Ok(())
    }

    async fn unregister_service(
        &self,
        service: &str,
        host: &HostInfo,
    ) -> Result<(), DiscoveryError> {
        let mut services = self.services.write().await;
        if let Some(entry) = services.get_mut(service) {
            let before = entry.hosts.len();
            entry.hosts.retain(|h| h != host);
            if entry.hosts.len() != before {
                tracing::info!("Service {} offline at {}", service, host);
                let _ = entry.changes.send(ServiceChange::Offline(host.clone()));
            }
        }
        Ok(())
    }

    async fn resolve(&self, service: &str) -> Result<Vec<HostInfo>, DiscoveryError> {
        let services = self.services.read().await;
        Ok(services
            .get(service)
            .map(|entry| entry.hosts.clone())
            .unwrap_or_default())
    }

    async fn subscribe(
        &self,
        service: &str,
    ) -> Result<broadcast::Receiver<ServiceChange>, DiscoveryError> {
        let mut services = self.services.write().await;
        Ok(services
            .entry(service.to_owned())
            .or_insert_with(ServiceEntry::new)
            .changes
            .subscribe())
    }
}
