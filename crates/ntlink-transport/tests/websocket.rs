//! Integration tests for the WebSocket client.
//!
//! These tests spin up a real WebSocket server on a random port and check
//! that frames cross the network with their kind (text or binary) intact
//! and that the subprotocol is offered.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use ntlink_transport::{
        Connection, Connector, Frame, SUBPROTOCOL, WebSocketConnector,
    };
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request, Response,
    };
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Binds a listener on a random port. Returns it with its `ws://` URL.
    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let addr = listener.local_addr().expect("should have addr");
        (listener, format!("ws://{addr}/nt/test-client"))
    }

    /// Accepts one client, echoing the subprotocol it offered.
    /// Returns the server-side stream and the offered subprotocol.
    async fn accept(listener: TcpListener) -> (ServerWs, Option<String>) {
        let (stream, _) = listener.accept().await.expect("should accept");
        let mut offered = None;
        let ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
                offered = req
                    .headers()
                    .get("Sec-WebSocket-Protocol")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                resp.headers_mut().insert(
                    "Sec-WebSocket-Protocol",
                    HeaderValue::from_static(SUBPROTOCOL),
                );
                Ok(resp)
            },
        )
        .await
        .expect("handshake should succeed");
        (ws, offered)
    }

    #[tokio::test]
    async fn test_websocket_connect_offers_subprotocol_and_exchanges_frames() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(accept(listener));

        let conn = WebSocketConnector
            .connect(&url)
            .await
            .expect("client should connect");
        let (mut server_ws, offered) = server.await.expect("task should complete");

        assert_eq!(offered.as_deref(), Some(SUBPROTOCOL));
        assert!(conn.id().into_inner() > 0);

        // --- Client sends text, server receives text ---
        conn.send(Frame::Text("[]".into())).await.expect("send text");
        let msg = server_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_text().unwrap().as_str(), "[]");

        // --- Client sends binary, server receives binary ---
        conn.send(Frame::Binary(vec![0x94, 0x01])).await.expect("send bin");
        let msg = server_ws.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0x94, 0x01]);

        // --- Server sends both kinds, client keeps them apart ---
        server_ws
            .send(Message::Text(String::from("[{\"method\":\"x\"}]").into()))
            .await
            .unwrap();
        server_ws
            .send(Message::Binary(vec![1, 2, 3].into()))
            .await
            .unwrap();

        let first = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(first, Frame::Text("[{\"method\":\"x\"}]".into()));
        let second = conn.recv().await.expect("recv").expect("frame");
        assert_eq!(second, Frame::Binary(vec![1, 2, 3]));

        conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_server_close() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(accept(listener));

        let conn = WebSocketConnector.connect(&url).await.expect("connect");
        let (mut server_ws, _) = server.await.unwrap();

        server_ws.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on server close");
    }

    #[tokio::test]
    async fn test_websocket_connect_to_closed_port_fails() {
        let (listener, url) = bind().await;
        drop(listener);

        let result = WebSocketConnector.connect(&url).await;
        assert!(result.is_err());
    }
}
