use super::binary_integral_method;
use tandem_tokio_rpc_server::{MethodDescriptor, error::RpcServiceEndpointError};

pub struct Multiply;

impl Multiply {
    pub const METHOD_NAME: &'static str = "multiply";

    pub fn descriptor() -> Result<MethodDescriptor, RpcServiceEndpointError> {
        binary_integral_method(Self::METHOD_NAME, i64::checked_mul)
    }
}
