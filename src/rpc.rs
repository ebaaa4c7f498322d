mod result_slot;
mod rpc_dispatcher;
mod rpc_requestor;

pub use result_slot::ResponseFuture;
pub use rpc_dispatcher::{MessageHandler, RpcDispatcher};
pub use rpc_requestor::{CallKind, RequestorError, ResponseCallback, RpcRequestor};

use crate::message::MessageKind;
use std::sync::Arc;

/// Routes inbound responses on `dispatcher` to `requestor`.
pub fn attach_requestor(dispatcher: &RpcDispatcher, requestor: &Arc<RpcRequestor>) {
    let requestor = requestor.clone();
    dispatcher.register_handler(MessageKind::Response, move |conn, message| {
        requestor.on_response(conn.as_ref(), message);
    });
}
