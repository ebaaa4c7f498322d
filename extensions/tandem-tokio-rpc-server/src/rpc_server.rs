//! Note: This `RpcServer` does not include authentication or authorization
//! mechanisms. It is best suited for trusted, internal network communication.
//! Any type that owns an [`RpcServiceEndpoint`] and an [`RpcDispatcher`] can
//! act as a server; this one does so over WebSockets using the Axum web
//! framework, one JSON-encoded message per binary frame.

use crate::RpcServerConfig;
use axum::{
    Router,
    extract::ConnectInfo,
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tandem::connection::{ChannelConnection, RpcConnection};
use tandem::constants::DEFAULT_WS_PATH;
use tandem::discovery::{DiscoveryError, HostInfo};
use tandem::message::Message;
use tandem::rpc::RpcDispatcher;
use tandem_rpc_service_endpoint::{MethodDescriptor, RpcServiceEndpoint};
use tokio::{
    net::{TcpListener, ToSocketAddrs},
    runtime::Handle,
    sync::mpsc,
    time::{Instant, interval_at, sleep},
};

/// An RPC server that listens for WebSocket connections and answers calls
/// against its [`RpcServiceEndpoint`].
///
/// Methods may be registered before or after the server starts; a method
/// registered while connections are open is callable on the very next
/// request.
pub struct RpcServer {
    endpoint: Arc<RpcServiceEndpoint>,
    dispatcher: Arc<RpcDispatcher>,
    config: RpcServerConfig,
    /// Set once the server is listening, if advertising is enabled.
    advertised: Mutex<Option<HostInfo>>,
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new(RpcServerConfig::default())
    }
}

impl RpcServer {
    pub fn new(config: RpcServerConfig) -> Self {
        let endpoint = Arc::new(RpcServiceEndpoint::new());
        let dispatcher = Arc::new(RpcDispatcher::new());
        endpoint.attach(&dispatcher);

        RpcServer {
            endpoint,
            dispatcher,
            config,
            advertised: Mutex::new(None),
        }
    }

    /// Returns an `Arc` clone of the underlying RPC service endpoint.
    pub fn endpoint(&self) -> Arc<RpcServiceEndpoint> {
        self.endpoint.clone()
    }

    /// Registers `descriptor`, making it callable immediately.
    ///
    /// If the server is already running with discovery enabled, the method is
    /// also advertised. The method stays registered locally even if
    /// advertising fails.
    pub async fn register_method(&self, descriptor: MethodDescriptor) -> Result<(), DiscoveryError> {
        let name = descriptor.name().to_owned();
        self.endpoint.register_method(descriptor);

        match (self.advertised_host(), &self.config.discovery) {
            (Some(host), Some(discovery)) => discovery.register_service(&name, &host).await,
            _ => Ok(()),
        }
    }

    /// Removes the method named `name` and withdraws its advertisement.
    pub async fn unregister_method(&self, name: &str) -> Result<bool, DiscoveryError> {
        let removed = self.endpoint.registry().unregister(name).is_some();

        if let (true, Some(host), Some(discovery)) =
            (removed, self.advertised_host(), &self.config.discovery)
        {
            discovery.unregister_service(name, &host).await?;
        }
        Ok(removed)
    }

    /// Binds to an address and starts the RPC server.
    ///
    /// The address can be any type that implements `ToSocketAddrs`, such as
    /// a string "127.0.0.1:8080" or a `SocketAddr`.
    pub async fn serve<A: ToSocketAddrs>(
        self: Arc<Self>,
        addr: A,
    ) -> Result<SocketAddr, axum::BoxError> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_listener(listener).await
    }

    /// Starts the RPC server on a specific host and port.
    pub async fn serve_on(
        self: Arc<Self>,
        host: &str,
        port: u16,
    ) -> Result<SocketAddr, axum::BoxError> {
        self.serve(format!("{host}:{port}")).await
    }

    /// Starts the RPC server with a pre-bound `TcpListener`.
    ///
    /// Every method registered so far is advertised before the first
    /// connection is accepted.
    pub async fn serve_with_listener(
        self: Arc<Self>,
        listener: TcpListener,
    ) -> Result<SocketAddr, axum::BoxError> {
        let address = listener.local_addr()?;

        if self.config.discovery.is_some() {
            let host = self
                .config
                .advertised_host
                .clone()
                .unwrap_or_else(|| HostInfo::from(address));
            // Publish the host before taking the snapshot of names, so a
            // concurrent `register_method` is covered by one of the two.
            *self.lock_advertised() = Some(host.clone());
            self.advertise_all(&host).await?;
        }

        let app = Router::new().route(
            DEFAULT_WS_PATH,
            get({
                let server = self.clone();
                move |ws, conn| Self::ws_handler(ws, conn, server)
            }),
        );
        tracing::info!("Server running on {:?}", address);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(address)
    }

    async fn advertise_all(&self, host: &HostInfo) -> Result<(), DiscoveryError> {
        let Some(discovery) = &self.config.discovery else {
            return Ok(());
        };
        for name in self.endpoint.registry().method_names() {
            discovery.register_service(&name, host).await?;
        }
        tracing::info!(
            "Advertised {} method(s) at {}",
            self.endpoint.registry().len(),
            host
        );
        Ok(())
    }

    fn advertised_host(&self) -> Option<HostInfo> {
        self.lock_advertised().clone()
    }

    fn lock_advertised(&self) -> std::sync::MutexGuard<'_, Option<HostInfo>> {
        self.advertised
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn ws_handler(
        ws: WebSocketUpgrade,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        server: Arc<RpcServer>,
    ) -> impl IntoResponse {
        tracing::info!("Client connected: {}", addr);
        ws.on_upgrade(move |socket| server.handle_socket(socket, addr))
    }

    async fn handle_socket(self: Arc<Self>, socket: WebSocket, addr: SocketAddr) {
        let (sender, receiver) = socket.split();
        let (conn, outbound) = ChannelConnection::new(addr.to_string(), Handle::current());
        let (control_tx, control_rx) = mpsc::unbounded_channel::<WsMessage>();

        tokio::spawn(Self::sender_task(sender, outbound, control_rx));

        tokio::spawn(Self::receiver_task(
            self.dispatcher.clone(),
            conn,
            receiver,
            control_tx,
            addr,
            self.config.heartbeat_interval,
            self.config.idle_timeout,
        ));
    }

    /// Writes outbound RPC messages and control frames (pings) to the client,
    /// in the order they were queued.
    async fn sender_task(
        mut sender: SplitSink<WebSocket, WsMessage>,
        mut outbound: mpsc::UnboundedReceiver<Message>,
        mut control: mpsc::UnboundedReceiver<WsMessage>,
    ) {
        loop {
            let frame = tokio::select! {
                Some(message) = outbound.recv() => WsMessage::Binary(Bytes::from(message.to_bytes())),
                Some(frame) = control.recv() => frame,
                else => break,
            };
            if sender.send(frame).await.is_err() {
                break; // Exit if the client has disconnected.
            }
        }
        let _ = sender.close().await;
    }

    /// The connection's dispatch loop.
    ///
    /// - Pings the client every `heartbeat_interval`.
    /// - Drops the client once `idle_timeout` passes without any frame from
    ///   it; pongs count, pings sent by the server do not.
    /// - Decodes binary frames and hands them to the dispatcher, one at a
    ///   time, in arrival order.
    async fn receiver_task(
        dispatcher: Arc<RpcDispatcher>,
        conn: Arc<ChannelConnection>,
        mut receiver: SplitStream<WebSocket>,
        control: mpsc::UnboundedSender<WsMessage>,
        addr: SocketAddr,
        heartbeat_interval: Duration,
        idle_timeout: Duration,
    ) {
        let dyn_conn: Arc<dyn RpcConnection> = conn.clone();

        let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
        let idle = sleep(idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if control.send(WsMessage::Ping(Bytes::new())).is_err() {
                        tracing::info!("Client {} disconnected (failed to send ping).", addr);
                        break;
                    }
                }

                _ = &mut idle => {
                    tracing::warn!("Client {} timed out. Closing connection.", addr);
                    break;
                }

                frame = receiver.next() => {
                    let Some(Ok(msg)) = frame else {
                        tracing::info!("Client {} disconnected.", addr);
                        break;
                    };
                    idle.as_mut().reset(Instant::now() + idle_timeout);

                    match msg {
                        WsMessage::Binary(bytes) => match Message::from_bytes(&bytes) {
                            Ok(message) => dispatcher.on_message(&dyn_conn, message),
                            Err(err) => {
                                tracing::warn!("Dropping frame from {}: {}", addr, err);
                            }
                        },
                        WsMessage::Pong(_) => {
                            tracing::trace!("Received pong from {}", addr);
                        }
                        WsMessage::Close(_) => {
                            tracing::info!("Client {} initiated close.", addr);
                            break;
                        }
                        _ => {} // Text and Ping are not part of the protocol.
                    }
                }
            }
        }

        // Dropping `control` and `conn` ends the sender task, which closes the socket.
        conn.close();
        tracing::info!("Terminated connection for {}.", addr);
    }
}
