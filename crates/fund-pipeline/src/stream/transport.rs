//! Socket seam
//!
//! [`Connector`] opens a [`Transport`]; a returned transport is already open
//! and may be written to. [`WsConnector`] is the production implementation
//! over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// An open, bidirectional text-frame channel
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next inbound text frame. `None` once the remote side has closed.
    async fn next_frame(&mut self) -> Option<Result<String>>;

    /// Close from our side. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

/// WebSocket connector
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        info!(url = url, "opening WebSocket");

        let (stream, _) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(url),
        )
        .await
        .map_err(|_| {
            PipelineError::transport(format!(
                "connect to {url} timed out after {:?}",
                self.connect_timeout
            ))
        })?
        .map_err(|e| PipelineError::transport(format!("connect to {url} failed: {e}")))?;

        debug!(url = url, "WebSocket open");
        Ok(Box::new(WsTransport {
            stream,
            closed: false,
        }))
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| PipelineError::transport(format!("failed to send WebSocket message: {e}")))
    }

    async fn next_frame(&mut self) -> Option<Result<String>> {
        while let Some(msg) = self.stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    return Some(Err(PipelineError::transport(format!(
                        "WebSocket read error: {e}"
                    ))));
                }
            };

            match msg {
                Message::Text(t) => return Some(Ok(t.to_string())),
                Message::Binary(b) => match String::from_utf8(b.to_vec()) {
                    Ok(s) => return Some(Ok(s)),
                    Err(_) => warn!("skipping non-UTF-8 binary frame"),
                },
                Message::Close(_) => {
                    info!("WebSocket closed by remote");
                    self.closed = true;
                    return None;
                }
                _ => {}
            }
        }
        None
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            // already torn down by the peer
            Err(
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed,
            ) => Ok(()),
            Err(e) => Err(PipelineError::transport(format!(
                "failed to close WebSocket: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn echo_then_close_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let request = ws.next().await.unwrap().unwrap();
            let request = request.into_text().unwrap().to_string();
            ws.send(Message::Text(r#"{"type":"session_start"}"#.to_string().into()))
                .await
                .unwrap();
            ws.send(Message::Text(format!(r#"{{"type":"echo","content":{request}}}"#).into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_ws_round_trip_against_loopback_server() {
        let url = echo_then_close_server().await;
        let connector = WsConnector::new(Duration::from_secs(5));
        let mut transport = connector.connect(&url).await.unwrap();

        transport.send(r#"{"hello":"engine"}"#.to_string()).await.unwrap();

        let first = transport.next_frame().await.unwrap().unwrap();
        assert_eq!(first, r#"{"type":"session_start"}"#);
        let second = transport.next_frame().await.unwrap().unwrap();
        assert!(second.contains(r#""hello":"engine""#));

        assert!(transport.next_frame().await.is_none());
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WsConnector::new(Duration::from_secs(5));
        let err = connector.connect(&format!("ws://{addr}")).await.err().unwrap();
        assert!(matches!(err, PipelineError::Transport(_)));
    }
}
