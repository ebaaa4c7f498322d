use std::time::Duration;
use tandem::constants::DEFAULT_CALL_TIMEOUT;

/// Settings for an [`crate::RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Deadline for calls that do not take one explicitly.
    pub call_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}
