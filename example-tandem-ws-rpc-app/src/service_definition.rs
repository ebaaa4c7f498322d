mod add;
pub use add::Add;

mod multiply;
pub use multiply::Multiply;

mod subtract;
pub use subtract::Subtract;

use serde_json::{Value, json};
use tandem_tokio_rpc_server::{HandlerError, MethodDescriptor, ValueKind, error::RpcServiceEndpointError};

/// Parameter document shared by the arithmetic methods.
pub fn operands(num1: i64, num2: i64) -> Value {
    json!({ "num1": num1, "num2": num2 })
}

/// Builds a method taking two integral operands and returning an integer.
fn binary_integral_method(
    name: &str,
    op: fn(i64, i64) -> Option<i64>,
) -> Result<MethodDescriptor, RpcServiceEndpointError> {
    let method = name.to_owned();
    MethodDescriptor::builder()
        .method_name(name)
        .param("num1", ValueKind::Integral)
        .param("num2", ValueKind::Integral)
        .return_kind(ValueKind::Integral)
        .handler(move |params: &Value| {
            let num1 = params["num1"].as_i64().ok_or("num1 out of range")?;
            let num2 = params["num2"].as_i64().ok_or("num2 out of range")?;
            let result = op(num1, num2)
                .ok_or_else(|| HandlerError(format!("{}({}, {}) overflowed", method, num1, num2)))?;
            tracing::info!("{}({}, {}) = {}", method, num1, num2, result);
            Ok(json!(result))
        })
        .build()
}
