//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a tokio-tungstenite client to verify
//! that frames actually flow over the network, including the split
//! sink/stream property: a send must complete while a recv is parked.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use gamelink_bus::WsListener;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on an ephemeral port, connects a client, and returns both
    /// ends of the accepted connection.
    async fn pair() -> (gamelink_bus::WsConnection, ClientWs) {
        let mut listener = WsListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("should have local addr");

        let server_handle = tokio::spawn(async move {
            listener.accept().await.expect("should accept")
        });

        let url = format!("ws://{addr}");
        let (client, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");

        let server = server_handle.await.expect("task should complete");
        (server, client)
    }

    #[tokio::test]
    async fn test_accept_and_send_receive_text() {
        let (server, mut client) = pair().await;
        assert!(server.id().into_inner() > 0);

        // Server sends, client receives.
        server
            .send(r#"{"type":"heartbeat_ack"}"#)
            .await
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"type":"heartbeat_ack"}"#);

        // Client sends, server receives.
        client
            .send(Message::Text("hello from client".into()))
            .await
            .unwrap();
        let received = server
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, "hello from client");

        server.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (server, mut client) = pair().await;
        client.send(Message::Close(None)).await.unwrap();

        let result = server.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_send_completes_while_recv_is_parked() {
        // The whole point of splitting sink and stream: a broadcast must
        // not wait for the client to say something first.
        let (server, mut client) = pair().await;
        let server = Arc::new(server);

        let reader = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.recv().await })
        };
        // Give the reader task time to take the stream lock.
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(
            Duration::from_secs(1),
            server.send("pushed while reading"),
        )
        .await
        .expect("send must not block behind a parked recv")
        .expect("send should succeed");

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "pushed while reading");

        // Unblock and finish the reader.
        client.send(Message::Text("done".into())).await.unwrap();
        let received = reader.await.unwrap().unwrap();
        assert_eq!(received.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique_across_accepts() {
        let (a, _client_a) = pair().await;
        let (b, _client_b) = pair().await;
        assert_ne!(a.id(), b.id());
    }
}
