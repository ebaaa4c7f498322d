use example_tandem_ws_rpc_app::init_tracing;
use example_tandem_ws_rpc_app::service_definition::{Add, Multiply, Subtract, operands};
use std::sync::Arc;
use tandem_tokio_rpc_client::RpcClient;
use tandem_tokio_rpc_server::RpcServer;
use tandem_tokio_rpc_server::utils::{bind_tcp_listener_on_random_port, tcp_listener_to_host_port};
use tokio::join;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Bind to a random available port
    let (listener, _port) = bind_tcp_listener_on_random_port().await?;
    let host = tcp_listener_to_host_port(&listener)?;

    let server = Arc::new(RpcServer::default());
    server.register_method(Add::descriptor()?).await?;
    server.register_method(Multiply::descriptor()?).await?;

    // Spawn the server using the pre-bound listener
    let _server_task = tokio::spawn({
        let server = server.clone();
        async move {
            let _ = server.serve_with_listener(listener).await;
        }
    });

    // Wait briefly for server to start
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let rpc_client = RpcClient::new(&host.address, host.port).await?;

    // `join!` will await all responses before proceeding
    let (res1, res2, res3, res4) = join!(
        rpc_client.call(Add::METHOD_NAME, operands(1, 2)),
        rpc_client.call(Add::METHOD_NAME, operands(8, 3)),
        rpc_client.call(Multiply::METHOD_NAME, operands(8, 3)),
        rpc_client.call(Subtract::METHOD_NAME, operands(8, 3)),
    );

    println!("Result from first add(): {:?}", res1);
    println!("Result from second add(): {:?}", res2);
    println!("Result from multiply(): {:?}", res3);
    println!("Result from subtract() before registration: {:?}", res4);

    // Register a method while the server is already serving.
    server.register_method(Subtract::descriptor()?).await?;

    let res5 = rpc_client
        .call(Subtract::METHOD_NAME, operands(8, 3))
        .await;
    println!("Result from subtract() after registration: {:?}", res5);

    Ok(())
}
