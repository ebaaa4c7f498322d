use crate::client_connection::{ClientConnection, ConnectionMap, SharedStateHandler, lock};
use crate::{RpcCallError, RpcClientConfig, RpcTransportState, response_to_result};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tandem::discovery::{Discovery, HostInfo, HostSelector};
use tandem::message::Message;
use tandem::rpc::ResponseFuture;
use tokio::runtime::Handle;

/// Where calls are sent.
enum Target {
    /// A single, fixed server.
    Direct(HostInfo),
    /// Whichever server the registry center lists for the method.
    Discovered(HostSelector),
}

/// A WebSocket RPC client.
///
/// Offers the three calling conventions of [`tandem::rpc::RpcRequestor`]
/// (async, blocking, callback) on top of one connection per server. A client
/// either talks to one fixed server ([`RpcClient::new`]) or resolves each
/// method through a registry center ([`RpcClient::with_discovery`]).
pub struct RpcClient {
    runtime: Handle,
    config: RpcClientConfig,
    target: Target,
    connections: Arc<ConnectionMap>,
    state_handler: SharedStateHandler,
}

impl RpcClient {
    /// Connects to the server at `host:port`.
    pub async fn new(host: &str, port: u16) -> io::Result<RpcClient> {
        Self::with_config(host, port, RpcClientConfig::default()).await
    }

    pub async fn with_config(host: &str, port: u16, config: RpcClientConfig) -> io::Result<RpcClient> {
        let host = HostInfo::new(host, port);
        let client = RpcClient {
            runtime: Handle::current(),
            config,
            target: Target::Direct(host.clone()),
            connections: Arc::new(Mutex::new(HashMap::new())),
            state_handler: Arc::new(Mutex::new(None)),
        };
        client.connect(&host).await?;
        Ok(client)
    }

    /// Creates a client that locates servers through `discovery`.
    ///
    /// Nothing is connected up front; the first call to a method resolves it
    /// and connects to one of the hosts providing it. Must be called from
    /// within a Tokio runtime.
    pub fn with_discovery(
        discovery: Arc<dyn Discovery>,
        config: RpcClientConfig,
    ) -> io::Result<RpcClient> {
        let runtime =
            Handle::try_current().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        Ok(RpcClient {
            runtime,
            config,
            target: Target::Discovered(HostSelector::new(discovery)),
            connections: Arc::new(Mutex::new(HashMap::new())),
            state_handler: Arc::new(Mutex::new(None)),
        })
    }

    /// Installs `handler` to be told when a connection opens or closes.
    ///
    /// If a connection is already open, `handler` is called with
    /// [`RpcTransportState::Connected`] right away.
    pub fn set_state_change_handler(
        &self,
        handler: impl Fn(RpcTransportState) + Send + Sync + 'static,
    ) {
        let handler: Arc<dyn Fn(RpcTransportState) + Send + Sync> = Arc::new(handler);
        *lock(&self.state_handler) = Some(handler.clone());

        if self.is_connected() {
            handler(RpcTransportState::Connected);
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.connections)
            .values()
            .any(|connection| connection.is_connected())
    }

    /// Number of calls in flight across every connection.
    pub fn pending_count(&self) -> usize {
        lock(&self.connections)
            .values()
            .map(|connection| connection.requestor().pending_count())
            .sum()
    }

    /// Calls `method` and awaits its result, using the configured timeout.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcCallError> {
        self.call_with_timeout(method, params, self.config.call_timeout)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcCallError> {
        let response = self.call_async(method, params, timeout).await?;
        response_to_result(response.await)
    }

    /// Sends the request and returns a handle to the eventual response
    /// without waiting for it.
    ///
    /// The handle yields the raw response message; a `TIMEOUT` response is
    /// synthesized if nothing arrives within `timeout`. Pass it to
    /// [`response_to_result`] for the caller-facing result.
    pub async fn call_async(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<ResponseFuture, RpcCallError> {
        let connection = self.connection_for(method).await?;
        let request = Message::rpc_request(method, params);

        Ok(connection
            .requestor()
            .call_async(&connection.rpc_connection(), request, timeout)?)
    }

    /// Calls `method`, blocking the current thread until the result arrives or
    /// `timeout` elapses.
    ///
    /// Must not be called from within an async task; use it from a plain
    /// thread or from `tokio::task::spawn_blocking`.
    pub fn call_blocking(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcCallError> {
        let connection = match self.live_direct_connection() {
            Some(connection) => connection,
            None => self.runtime.block_on(self.connection_for(method))?,
        };
        let request = Message::rpc_request(method, params);

        let response =
            connection
                .requestor()
                .call_blocking(&connection.rpc_connection(), request, timeout)?;
        response_to_result(response)
    }

    /// Calls `method` and hands the result to `callback` once it is known.
    ///
    /// `callback` runs exactly once: with the response, or with
    /// [`RpcCallError::Timeout`] after the configured timeout, or with
    /// [`RpcCallError::Disconnected`] if the connection drops first. Errors
    /// that prevent the request from being sent are returned instead.
    pub async fn call_with_callback<F>(
        &self,
        method: &str,
        params: Value,
        callback: F,
    ) -> Result<(), RpcCallError>
    where
        F: FnOnce(Result<Value, RpcCallError>) + Send + 'static,
    {
        let connection = self.connection_for(method).await?;
        let request = Message::rpc_request(method, params);

        connection.requestor().call_with_callback(
            &connection.rpc_connection(),
            request,
            self.config.call_timeout,
            Box::new(move |response| callback(response_to_result(response))),
        )?;
        Ok(())
    }

    /// The connection calls to `method` should go out on, connecting first if
    /// needed.
    async fn connection_for(&self, method: &str) -> Result<Arc<ClientConnection>, RpcCallError> {
        match &self.target {
            Target::Direct(host) => Ok(self.get_or_connect(host).await?),
            Target::Discovered(selector) => {
                let host = selector.select(method).await?;
                match self.get_or_connect(&host).await {
                    Ok(connection) => Ok(connection),
                    Err(err) => {
                        tracing::warn!("Evicting unreachable host {}: {}", host, err);
                        selector.evict(&host);
                        Err(err.into())
                    }
                }
            }
        }
    }

    fn live_direct_connection(&self) -> Option<Arc<ClientConnection>> {
        let Target::Direct(host) = &self.target else {
            return None;
        };
        lock(&self.connections)
            .get(host)
            .filter(|connection| connection.is_connected())
            .cloned()
    }

    async fn get_or_connect(&self, host: &HostInfo) -> io::Result<Arc<ClientConnection>> {
        let existing = lock(&self.connections)
            .get(host)
            .filter(|connection| connection.is_connected())
            .cloned();
        match existing {
            Some(connection) => Ok(connection),
            None => self.connect(host).await,
        }
    }

    async fn connect(&self, host: &HostInfo) -> io::Result<Arc<ClientConnection>> {
        let connection = ClientConnection::connect(
            host,
            self.runtime.clone(),
            self.state_handler.clone(),
            Arc::downgrade(&self.connections),
        )
        .await?;

        let mut connections = lock(&self.connections);
        let winner = connections
            .get(host)
            .filter(|existing| existing.is_connected())
            .cloned();
        if let Some(winner) = winner {
            // Another call connected to the same host first; keep that one.
            drop(connections);
            connection.close();
            return Ok(winner);
        }
        if !connection.is_connected() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("connection to {} closed during setup", host),
            ));
        }
        connections.insert(connection.host().clone(), connection.clone());
        Ok(connection)
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        let connections: Vec<_> = lock(&self.connections).drain().map(|(_, c)| c).collect();
        for connection in connections {
            connection.close();
        }
    }
}
