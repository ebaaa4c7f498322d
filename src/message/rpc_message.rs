use super::{MessageKind, StatusCode};
use crate::utils::generate_request_id;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Body key holding the method name of an RPC request.
pub const METHOD_KEY: &str = "method";
/// Body key holding the parameter document of an RPC request.
pub const PARAMETERS_KEY: &str = "parameters";
/// Body key holding the handler output of an RPC response.
pub const RESULT_KEY: &str = "result";

/// One protocol unit exchanged over an [`crate::connection::RpcConnection`].
///
/// A message is immutable once built. A response echoes the id of the request
/// it answers, but the two are distinct values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    kind: MessageKind,
    #[serde(default)]
    body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<StatusCode>,
}

impl Message {
    /// Starts building a message of the given kind.
    ///
    /// A fresh request id is pre-assigned; responses override it with
    /// [`MessageBuilder::id`].
    pub fn create(kind: MessageKind) -> MessageBuilder {
        MessageBuilder {
            id: generate_request_id(),
            kind,
            body: Value::Null,
            status: None,
        }
    }

    /// Builds an RPC request invoking `method` with a parameter document.
    pub fn rpc_request(method: &str, parameters: Value) -> Message {
        Message::create(MessageKind::Request)
            .body(json!({ METHOD_KEY: method, PARAMETERS_KEY: parameters }))
            .build()
    }

    /// Builds an RPC response answering the request with id `id`.
    pub fn rpc_response(id: &str, status: StatusCode, result: Value) -> Message {
        Message::create(MessageKind::Response)
            .id(id)
            .status(status)
            .body(json!({ RESULT_KEY: result }))
            .build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The method name of an RPC request, if present.
    pub fn method(&self) -> Option<&str> {
        self.body.get(METHOD_KEY).and_then(Value::as_str)
    }

    /// The parameter object of an RPC request, if present.
    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        self.body.get(PARAMETERS_KEY).and_then(Value::as_object)
    }

    /// The handler output of an RPC response, if present.
    pub fn result(&self) -> Option<&Value> {
        self.body.get(RESULT_KEY)
    }

    /// Consumes the message, returning its result document (or `Null`).
    pub fn into_result(self) -> Value {
        match self.body {
            Value::Object(mut map) => map.remove(RESULT_KEY).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // A `Message` only holds JSON-representable data.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Message, MessageDecodeError> {
        serde_json::from_slice(bytes).map_err(MessageDecodeError)
    }
}

/// Builder returned by [`Message::create`].
#[derive(Debug)]
pub struct MessageBuilder {
    id: String,
    kind: MessageKind,
    body: Value,
    status: Option<StatusCode>,
}

impl MessageBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            kind: self.kind,
            body: self.body,
            status: self.status,
        }
    }
}

/// Returned when inbound bytes do not decode into a [`Message`].
#[derive(Debug)]
pub struct MessageDecodeError(serde_json::Error);

impl fmt::Display for MessageDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed message: {}", self.0)
    }
}

impl std::error::Error for MessageDecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
