use serde::{Deserialize, Serialize};

/// The protocol unit a [`crate::message::Message`] represents.
///
/// The [`crate::rpc::RpcDispatcher`] routes inbound messages on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
    TopicRequest,
    TopicResponse,
    ServiceRequest,
    ServiceResponse,
    Heartbeat,
}
