use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// No live host currently provides the service.
    NoHosts(String),
    /// The registry center could not be reached or refused the operation.
    Unavailable(String),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::NoHosts(service) => write!(f, "no hosts provide {}", service),
            DiscoveryError::Unavailable(msg) => write!(f, "discovery unavailable: {}", msg),
        }
    }
}

impl std::error::Error for DiscoveryError {}
