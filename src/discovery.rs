mod discovery_error;
mod discovery_interface;
mod host_info;
mod host_selector;
mod in_memory_registry_center;

pub use discovery_error::DiscoveryError;
pub use discovery_interface::{Discovery, ServiceChange};
pub use host_info::HostInfo;
pub use host_selector::HostSelector;
pub use in_memory_registry_center::InMemoryRegistryCenter;
