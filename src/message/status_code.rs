use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome carried by every response message.
#[repr(u8)]
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    TryFromPrimitive,
    IntoPrimitive,
    Serialize,
    Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum StatusCode {
    Ok = 0,
    MethodNotFound = 1,
    ParamMismatch = 2,
    Timeout = 3,
    InternalError = 4,
    /// The request body did not carry a method name or a parameter object.
    InvalidMessage = 5,
    /// Synthesized locally when the connection closed with the call in flight.
    Disconnected = 6,
}

impl StatusCode {
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "ok",
            StatusCode::MethodNotFound => "method not found",
            StatusCode::ParamMismatch => "parameter mismatch",
            StatusCode::Timeout => "request timed out",
            StatusCode::InternalError => "internal error",
            StatusCode::InvalidMessage => "invalid message",
            StatusCode::Disconnected => "connection closed",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}
