use super::{TimerHandle, TransportError};
use crate::message::Message;
use std::time::Duration;

/// The narrow capability the correlation engine needs from a transport.
///
/// Every connection implementation exposes the same surface, so neither the
/// requestor nor the dispatcher ever needs to know the concrete transport.
pub trait RpcConnection: Send + Sync {
    /// Queues `message` for delivery. Never blocks; messages sent on one
    /// connection are delivered in send order.
    fn send(&self, message: Message) -> Result<(), TransportError>;

    /// Runs `callback` on this connection's scheduling loop after `delay`.
    fn arm_timer(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TimerHandle;

    fn cancel_timer(&self, handle: &TimerHandle) {
        handle.cancel();
    }

    fn is_connected(&self) -> bool;

    /// A printable name for the remote end, used in logs.
    fn peer(&self) -> String;
}
