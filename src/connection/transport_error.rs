use std::fmt;

/// Failure reported by a connection when a message cannot be handed to the
/// transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection has been closed by either side.
    Closed,
    /// The underlying transport rejected the message.
    Send(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "connection closed"),
            TransportError::Send(msg) => write!(f, "send failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}
