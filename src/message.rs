mod message_kind;
mod rpc_message;
mod status_code;

pub use message_kind::MessageKind;
pub use rpc_message::{
    METHOD_KEY, Message, MessageBuilder, MessageDecodeError, PARAMETERS_KEY, RESULT_KEY,
};
pub use status_code::StatusCode;
