use crate::{MethodDescriptor, ServiceRegistry};
use serde_json::Value;
use std::sync::Arc;
use tandem::connection::RpcConnection;
use tandem::message::{Message, MessageKind, PARAMETERS_KEY, StatusCode};
use tandem::rpc::RpcDispatcher;

/// Server-side invoker: validates inbound requests against the
/// [`ServiceRegistry`], runs the handler and sends the response back on the
/// connection the request arrived on.
///
/// Handlers run synchronously on the calling dispatch loop, so a slow handler
/// delays later requests on the same connection but never requests on other
/// connections.
#[derive(Debug, Default)]
pub struct RpcServiceEndpoint {
    registry: Arc<ServiceRegistry>,
}

impl RpcServiceEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an endpoint serving an existing registry.
    pub fn with_registry(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Makes `descriptor` callable immediately, replacing any method of the
    /// same name. Calls already running keep the descriptor they started with.
    pub fn register_method(&self, descriptor: MethodDescriptor) -> Option<Arc<MethodDescriptor>> {
        self.registry.register(descriptor)
    }

    /// Routes every inbound `Request` on `dispatcher` to this endpoint.
    pub fn attach(self: &Arc<Self>, dispatcher: &RpcDispatcher) {
        let endpoint = self.clone();
        dispatcher.register_handler(MessageKind::Request, move |conn, request| {
            endpoint.handle_request(conn.as_ref(), request);
        });
    }

    /// Answers one request on `conn`. Returns the status that was sent.
    ///
    /// Error responses carry a description of the failure as their result.
    pub fn handle_request(&self, conn: &dyn RpcConnection, request: Message) -> StatusCode {
        let (status, result) = self.process(&request);

        match status {
            StatusCode::Ok => tracing::trace!("Answered id={} from {}", request.id(), conn.peer()),
            _ => tracing::warn!(
                "Request id={} from {} failed: {} ({})",
                request.id(),
                conn.peer(),
                status,
                result
            ),
        }

        if let Err(err) = conn.send(Message::rpc_response(request.id(), status, result)) {
            tracing::warn!(
                "Could not send response id={} to {}: {}",
                request.id(),
                conn.peer(),
                err
            );
        }
        status
    }

    fn process(&self, request: &Message) -> (StatusCode, Value) {
        let (Some(method), Some(params)) = (request.method(), request.parameters()) else {
            return (
                StatusCode::InvalidMessage,
                Value::from("request must carry a method name and a parameter object"),
            );
        };

        let Some(descriptor) = self.registry.lookup(method) else {
            return (
                StatusCode::MethodNotFound,
                Value::from(format!("no method named {}", method)),
            );
        };

        if let Err(mismatch) = descriptor.check_params(params) {
            return (StatusCode::ParamMismatch, Value::from(mismatch));
        }

        let params = request.body().get(PARAMETERS_KEY).unwrap_or(&Value::Null);
        match descriptor.invoke(params) {
            Ok(result) => (StatusCode::Ok, result),
            Err(err) => (StatusCode::InternalError, Value::from(err.to_string())),
        }
    }
}
