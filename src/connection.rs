mod channel_connection;
mod rpc_connection;
mod timer_handle;
mod transport_error;

pub use channel_connection::{ChannelConnection, spawn_dispatch_loop};
pub use rpc_connection::RpcConnection;
pub use timer_handle::TimerHandle;
pub use transport_error::TransportError;
