//! Serves `add` and `multiply` from startup and registers `subtract` a couple
//! of seconds later, while already accepting calls.

use example_tandem_ws_rpc_app::service_definition::{Add, Multiply, Subtract};
use example_tandem_ws_rpc_app::{DEMO_HOST, DEMO_PORT, init_tracing};
use std::sync::Arc;
use std::time::Duration;
use tandem_tokio_rpc_server::RpcServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let server = Arc::new(RpcServer::default());
    server.register_method(Add::descriptor()?).await?;
    server.register_method(Multiply::descriptor()?).await?;
    tracing::info!("Registered add and multiply before start");

    let server_task = tokio::spawn({
        let server = server.clone();
        async move { server.serve_on(DEMO_HOST, DEMO_PORT).await }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    server.register_method(Subtract::descriptor()?).await?;
    tracing::info!("Registered subtract while serving");

    tokio::select! {
        result = server_task => {
            if let Err(err) = result? {
                tracing::error!("Server stopped: {}", err);
            }
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(())
}
