mod client_connection;

mod rpc_call_error;
pub use rpc_call_error::*;

mod rpc_client;
pub use rpc_client::*;

mod rpc_client_config;
pub use rpc_client_config::*;

mod rpc_transport_state;
pub use rpc_transport_state::*;
