//! Physical connection seam
//!
//! The channel driver only sees [`Connector`] and [`Transport`]; the
//! WebSocket implementation lives here, test doubles in `crate::testing`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::types::{ChannelError, ChannelResult};

/// Opens physical connections for a channel
///
/// Called once per connect attempt; each call yields a fresh socket.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> ChannelResult<Box<dyn Transport>>;
}

/// One open physical duplex connection
#[async_trait]
pub trait Transport: Send {
    /// Send one text message
    async fn send_text(&mut self, text: String) -> ChannelResult<()>;

    /// Wait for the next inbound message payload
    ///
    /// Returns `Ok(None)` when the peer closed the connection.
    async fn recv(&mut self) -> ChannelResult<Option<Vec<u8>>>;

    /// Close the connection; errors are ignored
    async fn close(&mut self);
}

/// WebSocket connector
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> ChannelResult<Box<dyn Transport>> {
        debug!(url = %self.url, "Opening WebSocket");
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        Ok(Box::new(WsTransport { socket }))
    }
}

struct WsTransport {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> ChannelResult<()> {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> ChannelResult<Option<Vec<u8>>> {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().as_bytes().to_vec()));
                }
                // Decoding happens in the dispatcher, which drops invalid UTF-8
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(Message::Ping(payload))) => {
                    trace!("WebSocket ping");
                    self.socket
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| ChannelError::Transport(e.to_string()))?;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by peer");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(ChannelError::Transport(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.socket.close(None).await;
    }
}
