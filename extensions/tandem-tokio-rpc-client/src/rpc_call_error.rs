use serde_json::Value;
use std::fmt;
use std::io;
use tandem::connection::TransportError;
use tandem::discovery::DiscoveryError;
use tandem::message::{Message, StatusCode};
use tandem::rpc::RequestorError;

/// Represents errors that can occur during an RPC call from the perspective
/// of the caller.
#[derive(Debug)]
pub enum RpcCallError {
    /// Connecting to the server or handing it the request failed.
    Transport(io::Error),
    /// No response arrived before the call's deadline.
    Timeout,
    /// The server answered with a non-OK status. `message` is the
    /// description the server sent along.
    Remote { status: StatusCode, message: String },
    /// The connection closed while the call was in flight.
    Disconnected,
    /// No server could be located for the method.
    Discovery(DiscoveryError),
}

impl RpcCallError {
    /// The status code this error corresponds to, where there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RpcCallError::Timeout => Some(StatusCode::Timeout),
            RpcCallError::Remote { status, .. } => Some(*status),
            RpcCallError::Disconnected => Some(StatusCode::Disconnected),
            RpcCallError::Transport(_) | RpcCallError::Discovery(_) => None,
        }
    }
}

impl fmt::Display for RpcCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcCallError::Transport(e) => write!(f, "Transport error: {}", e),
            RpcCallError::Timeout => write!(f, "RPC call timed out"),
            RpcCallError::Remote { status, message } => {
                write!(f, "Remote error ({}): {}", status, message)
            }
            RpcCallError::Disconnected => write!(f, "Connection closed during RPC call"),
            RpcCallError::Discovery(e) => write!(f, "Discovery error: {}", e),
        }
    }
}

impl std::error::Error for RpcCallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RpcCallError::Transport(e) => Some(e),
            RpcCallError::Discovery(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RpcCallError {
    fn from(e: io::Error) -> Self {
        RpcCallError::Transport(e)
    }
}

impl From<DiscoveryError> for RpcCallError {
    fn from(e: DiscoveryError) -> Self {
        RpcCallError::Discovery(e)
    }
}

impl From<TransportError> for RpcCallError {
    fn from(e: TransportError) -> Self {
        let kind = match e {
            TransportError::Closed => io::ErrorKind::NotConnected,
            TransportError::Send(_) => io::ErrorKind::BrokenPipe,
        };
        RpcCallError::Transport(io::Error::new(kind, e))
    }
}

impl From<RequestorError> for RpcCallError {
    fn from(e: RequestorError) -> Self {
        match e {
            RequestorError::Transport(e) => e.into(),
            RequestorError::Timeout => RpcCallError::Timeout,
            RequestorError::Disconnected => RpcCallError::Disconnected,
            RequestorError::DuplicateRequestId(_) => {
                RpcCallError::Transport(io::Error::new(io::ErrorKind::AlreadyExists, e))
            }
        }
    }
}

/// Turns a response message into the caller-facing result.
pub fn response_to_result(response: Message) -> Result<Value, RpcCallError> {
    match response.status() {
        Some(StatusCode::Ok) => Ok(response.into_result()),
        Some(StatusCode::Timeout) => Err(RpcCallError::Timeout),
        Some(StatusCode::Disconnected) => Err(RpcCallError::Disconnected),
        Some(status) => {
            let message = match response.into_result() {
                Value::String(message) => message,
                Value::Null => status.reason().to_owned(),
                other => other.to_string(),
            };
            Err(RpcCallError::Remote { status, message })
        }
        None => Err(RpcCallError::Remote {
            status: StatusCode::InvalidMessage,
            message: "response carried no status".to_owned(),
        }),
    }
}
