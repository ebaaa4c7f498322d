//! Call-lifecycle and dispatch engine.
//!
//! - [`message`]: the immutable [`message::Message`] value exchanged between peers.
//! - [`connection`]: the capability a transport exposes ([`connection::RpcConnection`]).
//! - [`rpc`]: the client-side [`rpc::RpcRequestor`] and the [`rpc::RpcDispatcher`]
//!   routing table.
//! - [`discovery`]: the registry-center capability and a client-side host cache.
//!
//! Server-side method registration lives in `tandem-rpc-service-endpoint`;
//! the WebSocket facades live in `tandem-tokio-rpc-server` and
//! `tandem-tokio-rpc-client`.

pub mod connection;
pub mod constants;
pub mod discovery;
pub mod message;
pub mod rpc;
pub mod utils;
