use axum::{Router, extract::ws::WebSocketUpgrade, routing::get};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tandem_tokio_rpc_client::{RpcClient, RpcTransportState};
use tandem_tokio_rpc_server::RpcServer;
use tandem_tokio_rpc_server::utils::tcp_listener_to_host_port;
use tokio::{
    net::TcpListener,
    time::{Duration, sleep, timeout},
};

#[tokio::test]
async fn test_client_errors_on_connection_failure() {
    // Attempt to connect to an address that is not listening.
    let result = RpcClient::new(
        "127.0.0.1",
        // Use a port that's almost certainly unused.
        1,
    )
    .await;

    // Assert that the connection attempt resulted in an error.
    assert!(result.is_err());
    let err = result.err().unwrap();
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
}

#[tokio::test]
async fn test_transport_state_change_handler() {
    // 1. --- SETUP: START A REAL RPC SERVER ---
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Arc::new(RpcServer::default());

    let server_host = tcp_listener_to_host_port(&listener).unwrap();

    // Spawn the server to run in the background.
    let _server_task = tokio::spawn(async move {
        let _ = server.serve_with_listener(listener).await;
    });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // 2. --- SETUP: CONNECT CLIENT AND REGISTER HANDLER ---
    let received_states = Arc::new(Mutex::new(Vec::new()));
    let client = RpcClient::new(&server_host.address, server_host.port)
        .await
        .unwrap();

    let states_clone = received_states.clone();
    client.set_state_change_handler(move |state| {
        states_clone.lock().unwrap().push(state);
    });

    // Give a moment for the initial "Connected" state to be registered.
    sleep(Duration::from_millis(50)).await;

    // 3. --- TEST: SIMULATE DISCONNECTION BY DROPPING THE CLIENT ---
    // Dropping the client aborts its background tasks and signals the
    // disconnection.
    drop(client);

    // Give the tasks a moment to clean up and call the disconnect handler.
    sleep(Duration::from_millis(100)).await;

    // 4. --- ASSERT ---
    let final_states = received_states.lock().unwrap();
    assert_eq!(
        *final_states,
        vec![
            RpcTransportState::Connected,
            RpcTransportState::Disconnected
        ],
        "The state change handler should have been called for both connect and disconnect events."
    );
}

#[tokio::test]
async fn test_connection_closed_on_arrival_is_not_kept() {
    // A server that completes the upgrade and hangs up at once.
    let app = Router::new().route(
        "/ws",
        get(|ws: WebSocketUpgrade| async move { ws.on_upgrade(|socket| async move { drop(socket) }) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_host = tcp_listener_to_host_port(&listener).unwrap();
    let server_task = tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    sleep(Duration::from_millis(100)).await;

    match RpcClient::new(&server_host.address, server_host.port).await {
        // The close won the race against setup.
        Err(err) => assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset),
        Ok(client) => {
            sleep(Duration::from_millis(200)).await;
            assert!(!client.is_connected());
            assert_eq!(client.pending_count(), 0);

            // The dead connection is not reused; the call reconnects and
            // fails instead of waiting out its timeout.
            let result = timeout(Duration::from_secs(2), client.call("add", json!({})))
                .await
                .expect("call waited on a dead connection");
            assert!(result.is_err());
            assert_eq!(client.pending_count(), 0);
        }
    }

    server_task.abort();
}
