//! Issues one blocking `add(1, 2)` call with the default 5 second timeout.
//! Against a server that answers too slowly (or not at all) the call fails
//! with a timeout after about 5 seconds instead of hanging.

use example_tandem_ws_rpc_app::service_definition::{Add, operands};
use example_tandem_ws_rpc_app::{DEMO_HOST, DEMO_PORT, init_tracing};
use std::sync::Arc;
use std::time::Instant;
use tandem::constants::DEFAULT_CALL_TIMEOUT;
use tandem_tokio_rpc_client::{RpcCallError, RpcClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let client = Arc::new(RpcClient::new(DEMO_HOST, DEMO_PORT).await?);

    let started = Instant::now();
    let result = tokio::task::spawn_blocking({
        let client = client.clone();
        move || client.call_blocking(Add::METHOD_NAME, operands(1, 2), DEFAULT_CALL_TIMEOUT)
    })
    .await?;

    match result {
        Ok(value) => println!("add(1, 2) = {} after {:?}", value, started.elapsed()),
        Err(RpcCallError::Timeout) => {
            println!("add(1, 2) timed out as expected after {:?}", started.elapsed())
        }
        Err(err) => println!("add(1, 2) failed: {}", err),
    }
    Ok(())
}
