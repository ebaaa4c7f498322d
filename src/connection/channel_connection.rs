use super::{RpcConnection, TimerHandle, TransportError};
use crate::message::Message;
use crate::rpc::RpcDispatcher;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// An [`RpcConnection`] backed by an unbounded FIFO channel.
///
/// Outbound messages are pushed onto the channel and drained by whatever owns
/// the receiving half (a WebSocket writer task, or the peer's dispatch loop for
/// in-process pairs). Timers are tasks spawned on the runtime the connection
/// was created on, so they can be armed from any thread.
pub struct ChannelConnection {
    tx: UnboundedSender<Message>,
    runtime: Handle,
    peer: String,
    connected: AtomicBool,
}

impl ChannelConnection {
    /// Creates a connection and the receiver its outbound messages land on.
    pub fn new(peer: impl Into<String>, runtime: Handle) -> (Arc<Self>, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            tx,
            runtime,
            peer: peer.into(),
            connected: AtomicBool::new(true),
        });
        (conn, rx)
    }

    /// Creates two connected in-process endpoints.
    ///
    /// Each tuple holds a connection and the receiver of messages sent *to*
    /// it by the other end; hand both to [`spawn_dispatch_loop`].
    pub fn pair(
        runtime: Handle,
    ) -> (
        (Arc<Self>, UnboundedReceiver<Message>),
        (Arc<Self>, UnboundedReceiver<Message>),
    ) {
        let (a, a_outbound) = Self::new("mem:b", runtime.clone());
        let (b, b_outbound) = Self::new("mem:a", runtime);
        ((a, b_outbound), (b, a_outbound))
    }

    /// Marks the connection closed. Later sends fail with
    /// [`TransportError::Closed`].
    pub fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::debug!("Connection to {} closed", self.peer);
        }
    }
}

impl RpcConnection for ChannelConnection {
    fn send(&self, message: Message) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }

    fn arm_timer(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        TimerHandle::from_task(task.abort_handle())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// Spawns the dispatch loop for one connection.
///
/// The loop delivers inbound messages to `dispatcher` one at a time, in
/// arrival order. It ends (and closes `conn`) once the inbound channel is
/// exhausted.
pub fn spawn_dispatch_loop(
    conn: Arc<ChannelConnection>,
    mut inbound: UnboundedReceiver<Message>,
    dispatcher: Arc<RpcDispatcher>,
) -> JoinHandle<()> {
    let runtime = conn.runtime.clone();
    runtime.spawn(async move {
        let dyn_conn: Arc<dyn RpcConnection> = conn.clone();
        while let Some(message) = inbound.recv().await {
            dispatcher.on_message(&dyn_conn, message);
        }
        conn.close();
    })
}
