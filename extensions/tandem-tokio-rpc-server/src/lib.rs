mod rpc_server;
pub use rpc_server::*;

mod rpc_server_config;
pub use rpc_server_config::*;

pub mod utils;

pub use tandem_rpc_service_endpoint::{
    MethodDescriptor, MethodDescriptorBuilder, RpcServiceEndpoint, ServiceRegistry, ValueKind,
    error, error::HandlerError,
};
