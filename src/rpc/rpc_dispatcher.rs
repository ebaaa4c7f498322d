use crate::connection::RpcConnection;
use crate::message::{Message, MessageKind};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Callback invoked for every inbound message of one [`MessageKind`].
pub type MessageHandler = Arc<dyn Fn(&Arc<dyn RpcConnection>, Message) + Send + Sync>;

/// Routing table from message kind to handler.
///
/// This is the single entry point a connection's dispatch loop calls when a
/// message arrives. A dispatcher is an ordinary owned value: each client or
/// server builds its own and wires it to a requestor or to a service
/// endpoint, so several independent instances can live in one process.
#[derive(Default)]
pub struct RpcDispatcher {
    handlers: RwLock<HashMap<MessageKind, MessageHandler>>,
}

impl RpcDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes messages of `kind` to `handler`, replacing any earlier route.
    pub fn register_handler<F>(&self, kind: MessageKind, handler: F)
    where
        F: Fn(&Arc<dyn RpcConnection>, Message) + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if handlers.insert(kind, Arc::new(handler)).is_some() {
            tracing::debug!("Replaced dispatcher route for {:?}", kind);
        }
    }

    pub fn has_handler(&self, kind: MessageKind) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&kind)
    }

    /// Delivers `message` to the handler registered for its kind.
    ///
    /// Messages with no route are logged and dropped; the connection stays
    /// up. The handler runs after the table lock is released, so it may
    /// itself register routes.
    pub fn on_message(&self, conn: &Arc<dyn RpcConnection>, message: Message) {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&message.kind())
            .cloned();

        match handler {
            Some(handler) => handler(conn, message),
            None => tracing::warn!(
                "No route for {:?} message id={} from {}; dropping",
                message.kind(),
                message.id(),
                conn.peer()
            ),
        }
    }
}

impl std::fmt::Debug for RpcDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("RpcDispatcher")
            .field("routes", &handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
