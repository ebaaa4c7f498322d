use std::io::Result;
use std::net::SocketAddr;
use tandem::discovery::HostInfo;
use tokio::net::TcpListener;

/// The address a bound `TcpListener` actually listens on, as a [`HostInfo`].
///
/// Mostly useful after binding port 0, to learn the port the OS assigned.
pub fn tcp_listener_to_host_port(listener: &TcpListener) -> Result<HostInfo> {
    let local_addr: SocketAddr = listener.local_addr()?;
    Ok(HostInfo::from(local_addr))
}
