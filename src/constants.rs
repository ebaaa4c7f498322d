use std::time::Duration;

/// Deadline applied to a call when the caller does not pick one.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// The interval at which a server pings each connected client.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// The maximum time a server waits for any frame from a client (including
/// Pong) before considering the connection dead.
pub const CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Path the WebSocket transport is served on.
pub const DEFAULT_WS_PATH: &str = "/ws";
