use super::{Discovery, DiscoveryError, HostInfo, ServiceChange};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast::error::RecvError;

#[derive(Default)]
struct ServiceHosts {
    hosts: Vec<HostInfo>,
    next: usize,
}

type HostCache = Mutex<HashMap<String, ServiceHosts>>;

/// Client-side view of which hosts provide which service.
///
/// The first lookup of a service resolves it through [`Discovery`] and starts
/// following its change notifications; later lookups are served from the
/// cache in round-robin order.
pub struct HostSelector {
    discovery: Arc<dyn Discovery>,
    cache: Arc<HostCache>,
}

impl HostSelector {
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self {
            discovery,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Picks the next host for `service`.
    pub async fn select(&self, service: &str) -> Result<HostInfo, DiscoveryError> {
        if let Some(host) = next_host(&mut lock_cache(&self.cache), service) {
            return Ok(host);
        }

        // Subscribe before resolving so no change between the two is lost.
        let changes = self.discovery.subscribe(service).await?;
        let hosts = self.discovery.resolve(service).await?;
        tracing::debug!("Resolved {} to {} host(s)", service, hosts.len());

        let newly_tracked = {
            let mut cache = lock_cache(&self.cache);
            let tracked = cache.contains_key(service);
            cache.entry(service.to_owned()).or_default().hosts = hosts;
            !tracked
        };

        if newly_tracked {
            tokio::spawn(follow_changes(
                self.discovery.clone(),
                Arc::downgrade(&self.cache),
                service.to_owned(),
                changes,
            ));
        }

        next_host(&mut lock_cache(&self.cache), service)
            .ok_or_else(|| DiscoveryError::NoHosts(service.to_owned()))
    }

    /// Drops `host` from every cached service, e.g. after failing to reach it.
    pub fn evict(&self, host: &HostInfo) {
        for entry in lock_cache(&self.cache).values_mut() {
            entry.hosts.retain(|h| h != host);
        }
    }

    /// The hosts currently cached for `service`.
    pub fn cached_hosts(&self, service: &str) -> Vec<HostInfo> {
        lock_cache(&self.cache)
            .get(service)
            .map(|entry| entry.hosts.clone())
            .unwrap_or_default()
    }
}

fn lock_cache(cache: &HostCache) -> MutexGuard<'_, HashMap<String, ServiceHosts>> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next_host(cache: &mut HashMap<String, ServiceHosts>, service: &str) -> Option<HostInfo> {
    let entry = cache.get_mut(service)?;
    if entry.hosts.is_empty() {
        return None;
    }
    let host = entry.hosts[entry.next % entry.hosts.len()].clone();
    entry.next = entry.next.wrapping_add(1);
    Some(host)
}

async fn follow_changes(
    discovery: Arc<dyn Discovery>,
    cache: Weak<HostCache>,
    service: String,
    mut changes: tokio::sync::broadcast::Receiver<ServiceChange>,
) {
    loop {
        let change = changes.recv().await;
        let Some(cache) = cache.upgrade() else {
            break;
        };

        match change {
            Ok(ServiceChange::Online(host)) => {
                let mut cache = lock_cache(&cache);
                let entry = cache.entry(service.clone()).or_default();
                if !entry.hosts.contains(&host) {
                    tracing::debug!("{} now also served by {}", service, host);
                    entry.hosts.push(host);
                }
            }
            Ok(ServiceChange::Offline(host)) => {
                tracing::debug!("{} no longer served by {}", service, host);
                if let Some(entry) = lock_cache(&cache).get_mut(&service) {
                    entry.hosts.retain(|h| h != &host);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    "Missed {} change(s) for {}; resolving again",
                    skipped,
                    service
                );
                match discovery.resolve(&service).await {
                    Ok(hosts) => lock_cache(&cache).entry(service.clone()).or_default().hosts = hosts,
                    Err(err) => tracing::error!("Re-resolving {} failed: {}", service, err),
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}
