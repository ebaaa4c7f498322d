use axum::{
    Router,
    extract::ws::{Message, WebSocketUpgrade},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tandem_tokio_rpc_client::RpcClient;
use tandem_tokio_rpc_server::utils::tcp_listener_to_host_port;
use tokio::{
    net::TcpListener,
    sync::oneshot,
    time::{Duration, timeout},
};

#[tokio::test]
async fn test_client_responds_to_ping_with_pong() {
    // 1. --- SETUP: A MOCK SERVER THAT SENDS A PING ---
    let (tx, rx) = oneshot::channel::<bool>();
    // Wrap the sender to make it shareable and cloneable for the handler.
    let shared_tx = Arc::new(Mutex::new(Some(tx)));
    let ping_payload = b"heartbeat-check".to_vec();

    let app = Router::new().route(
        "/ws",
        get({
            let shared_tx = shared_tx.clone();
            move |ws: WebSocketUpgrade| async move {
                ws.on_upgrade(move |mut socket| async move {
                    // Send a ping from server to client
                    socket
                        .send(Message::Ping(ping_payload.clone().into()))
                        .await
                        .unwrap();

                    // Wait for the client's pong response
                    let pong_matches = matches!(
                        timeout(Duration::from_secs(1), socket.recv()).await,
                        Ok(Some(Ok(Message::Pong(ref pong_payload))))
                            if pong_payload.as_ref() == ping_payload.as_slice()
                    );
                    if let Some(tx) = shared_tx.lock().unwrap().take() {
                        let _ = tx.send(pong_matches);
                    }

                    // Stay connected until the client goes away.
                    while let Some(Ok(_)) = socket.recv().await {}
                })
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_host = tcp_listener_to_host_port(&listener).unwrap();

    let server_task = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    // 2. --- SETUP: CONNECT THE RPC CLIENT ---
    // Its receive loop should answer the ping on its own.
    let client = RpcClient::new(&server_host.address, server_host.port)
        .await
        .unwrap();

    // 3. --- ASSERT ---
    let pong_received_correctly = timeout(Duration::from_secs(2), rx)
        .await
        .expect("Test timed out waiting for server confirmation")
        .expect("Oneshot channel was dropped");

    assert!(
        pong_received_correctly,
        "Client did not respond with a matching Pong message"
    );

    // Answering the ping happens below the RPC layer: the connection stays
    // live and no call was issued for it.
    assert!(client.is_connected());
    assert_eq!(client.pending_count(), 0);

    server_task.abort();
}
