use crate::RpcTransportState;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tandem::connection::{ChannelConnection, RpcConnection};
use tandem::constants::DEFAULT_WS_PATH;
use tandem::discovery::HostInfo;
use tandem::message::{Message, StatusCode};
use tandem::rpc::{RpcDispatcher, RpcRequestor, attach_requestor};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, protocol::Message as WsMessage},
};

pub(crate) type StateHandler = Arc<dyn Fn(RpcTransportState) + Send + Sync>;
pub(crate) type SharedStateHandler = Arc<Mutex<Option<StateHandler>>>;
pub(crate) type ConnectionMap = Mutex<HashMap<HostInfo, Arc<ClientConnection>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn notify_state(handler: &SharedStateHandler, state: RpcTransportState) {
    let handler = lock(handler).clone();
    if let Some(handler) = handler {
        handler(state);
    }
}

/// One WebSocket connection to one server, with its own requestor.
///
/// Two tasks drive it: a writer draining the [`ChannelConnection`] queue into
/// the socket, and a reader that acts as the dispatch loop. When the reader
/// sees the socket close, every call still pending on this connection
/// resolves with `DISCONNECTED`.
pub(crate) struct ClientConnection {
    host: HostInfo,
    conn: Arc<ChannelConnection>,
    requestor: Arc<RpcRequestor>,
    connected: AtomicBool,
    state_handler: SharedStateHandler,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl ClientConnection {
    pub(crate) async fn connect(
        host: &HostInfo,
        runtime: Handle,
        state_handler: SharedStateHandler,
        connections: Weak<ConnectionMap>,
    ) -> io::Result<Arc<Self>> {
        let url = format!("ws://{}:{}{}", host.address, host.port, DEFAULT_WS_PATH);
        let (ws_stream, _) = connect_async(url.as_str()).await.map_err(into_io_error)?;
        let (mut sender, mut receiver) = ws_stream.split();
        tracing::info!("Connected to {}", url);

        let (conn, mut outbound) = ChannelConnection::new(host.to_string(), runtime.clone());
        let requestor = Arc::new(RpcRequestor::new());
        let dispatcher = Arc::new(RpcDispatcher::new());
        attach_requestor(&dispatcher, &requestor);

        let connection = Arc::new(ClientConnection {
            host: host.clone(),
            conn,
            requestor,
            connected: AtomicBool::new(true),
            state_handler,
            tasks: Mutex::new(Vec::new()),
        });

        // Send loop
        let send_task = runtime.spawn(async move {
            while let Some(message) = outbound.recv().await {
                let frame = WsMessage::Binary(Bytes::from(message.to_bytes()));
                if sender.send(frame).await.is_err() {
                    break;
                }
            }
        });
        // Registered before the receive loop exists, so a socket that closes
        // straight away still aborts the writer.
        lock(&connection.tasks).push(send_task.abort_handle());
        notify_state(&connection.state_handler, RpcTransportState::Connected);

        // Receive loop; doubles as the connection's dispatch loop.
        let recv_task = runtime.spawn({
            let connection = connection.clone();
            async move {
                let dyn_conn: Arc<dyn RpcConnection> = connection.conn.clone();
                while let Some(frame) = receiver.next().await {
                    match frame {
                        Ok(WsMessage::Binary(bytes)) => match Message::from_bytes(&bytes) {
                            Ok(message) => dispatcher.on_message(&dyn_conn, message),
                            Err(err) => {
                                tracing::warn!("Dropping frame from {}: {}", connection.host, err)
                            }
                        },
                        Ok(WsMessage::Close(_)) => break,
                        Ok(_) => {} // Pings are answered by the socket itself.
                        Err(err) => {
                            tracing::warn!("Connection to {} failed: {}", connection.host, err);
                            break;
                        }
                    }
                }

                // Shut down before touching the map: a client inserting this
                // connection checks `is_connected` under the map lock, so it
                // either sees it dead or inserts it before the removal below.
                connection.shutdown();
                if let Some(connections) = connections.upgrade() {
                    let mut connections = lock(&connections);
                    if connections
                        .get(&connection.host)
                        .is_some_and(|c| Arc::ptr_eq(c, &connection))
                    {
                        connections.remove(&connection.host);
                    }
                }
            }
        });
        lock(&connection.tasks).push(recv_task.abort_handle());

        Ok(connection)
    }

    pub(crate) fn host(&self) -> &HostInfo {
        &self.host
    }

    pub(crate) fn requestor(&self) -> &Arc<RpcRequestor> {
        &self.requestor
    }

    pub(crate) fn rpc_connection(&self) -> Arc<dyn RpcConnection> {
        self.conn.clone()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && self.conn.is_connected()
    }

    /// Stops both tasks and tears the connection down.
    pub(crate) fn close(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        self.shutdown();
    }

    /// Marks the connection dead, fails its pending calls and reports the
    /// transition. Runs at most once.
    fn shutdown(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::info!("Disconnected from {}", self.host);
        self.conn.close();
        for task in lock(&self.tasks).iter() {
            task.abort();
        }
        self.requestor.fail_all(StatusCode::Disconnected);
        notify_state(&self.state_handler, RpcTransportState::Disconnected);
    }
}

fn into_io_error(err: WsError) -> io::Error {
    match err {
        WsError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}
