use std::io::Result;
use tokio::net::TcpListener;

/// Binds a `TcpListener` to a free port on the loopback address
/// (`127.0.0.1`) and returns it together with the port the OS picked.
pub async fn bind_tcp_listener_on_random_port() -> Result<(TcpListener, u16)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    Ok((listener, port))
}
