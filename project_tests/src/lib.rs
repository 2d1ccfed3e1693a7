//! Shared helpers for the integration tests: an in-process WebSocket stub
//! standing in for the backend search service.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, WebSocketStream};
use url::Url;

/// Binds a stub server socket on an ephemeral local port.
pub async fn bind_stub_server() -> (SocketAddr, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub server local addr");
    (addr, listener)
}

/// Accepts one client connection and completes the WebSocket handshake.
pub async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.expect("accept connection");
    accept_async(stream).await.expect("websocket handshake")
}

/// Stream endpoint URL for a stub server address.
pub fn ws_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("ws://{addr}/ws/search")).expect("stub url")
}
