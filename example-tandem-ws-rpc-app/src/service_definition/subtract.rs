use super::binary_integral_method;
use tandem_tokio_rpc_server::{MethodDescriptor, error::RpcServiceEndpointError};

pub struct Subtract;

impl Subtract {
    pub const METHOD_NAME: &'static str = "subtract";

    pub fn descriptor() -> Result<MethodDescriptor, RpcServiceEndpointError> {
        binary_integral_method(Self::METHOD_NAME, i64::checked_sub)
    }
}
