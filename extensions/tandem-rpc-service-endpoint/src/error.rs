use std::fmt;

/// Errors reported when building or registering a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcServiceEndpointError {
    /// The descriptor has no method name.
    EmptyMethodName,
    /// The descriptor has no handler.
    MissingHandler(String),
    /// The descriptor has no return kind.
    MissingReturnKind(String),
    /// The same parameter was declared twice.
    DuplicateParameter { method: String, param: String },
}

impl fmt::Display for RpcServiceEndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcServiceEndpointError::EmptyMethodName => write!(f, "method name is empty"),
            RpcServiceEndpointError::MissingHandler(method) => {
                write!(f, "method {} has no handler", method)
            }
            RpcServiceEndpointError::MissingReturnKind(method) => {
                write!(f, "method {} has no return kind", method)
            }
            RpcServiceEndpointError::DuplicateParameter { method, param } => {
                write!(f, "method {} declares parameter {} twice", method, param)
            }
        }
    }
}

impl std::error::Error for RpcServiceEndpointError {}

/// Returned by a method handler to fail the call with `INTERNAL_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError(message.into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError(message.to_owned())
    }
}
