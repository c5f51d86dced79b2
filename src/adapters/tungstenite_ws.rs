//! Tungstenite-based WebSocket transport.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::{classify_connect_error, classify_stream_error, TransportError};
use crate::traits::{Transport, TransportEvent, TransportSession};

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on sending the close frame at unsubscribe.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket transport using tokio-tungstenite.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use benchscope::adapters::TungsteniteTransport;
/// use benchscope::stream::TelemetryClient;
///
/// let client = TelemetryClient::new(Arc::new(TungsteniteTransport::new()));
/// ```
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    connect_timeout: Duration,
}

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn TransportSession>, TransportError> {
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(TransportError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: "expected a ws:// or wss:// URL".to_string(),
            });
        }

        let handshake = tokio::time::timeout(self.connect_timeout, connect_async(endpoint));
        let (stream, response) = match handshake.await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => return Err(classify_connect_error(&e, endpoint)),
            Err(_) => {
                return Err(TransportError::Timeout {
                    operation: "connect".to_string(),
                    duration_ms: self.connect_timeout.as_millis() as u64,
                })
            }
        };

        info!(
            endpoint,
            status = response.status().as_u16(),
            "WebSocket handshake complete"
        );
        Ok(Box::new(TungsteniteSession { stream }))
    }
}

/// An open tungstenite WebSocket.
pub struct TungsteniteSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportSession for TungsteniteSession {
    async fn recv(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text),
                Some(Ok(Message::Binary(data))) => return TransportEvent::Binary(data),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), Some(frame.reason.into_owned())),
                        None => (None, None),
                    };
                    info!(?code, ?reason, "Received close frame from server");
                    return TransportEvent::Lost(TransportError::Closed { code, reason });
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong reply itself
                    debug!("Received ping");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return TransportEvent::Lost(classify_stream_error(&e)),
                None => {
                    return TransportEvent::Lost(TransportError::Closed {
                        code: None,
                        reason: None,
                    })
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed {
                message: e.to_string(),
            })
    }

    async fn close(&mut self) {
        let frame = tokio_tungstenite::tungstenite::protocol::CloseFrame {
            code: CloseCode::Normal,
            reason: "unsubscribe".into(),
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, self.stream.close(Some(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Error while closing WebSocket: {}", e),
            Err(_) => debug!("Timed out closing WebSocket"),
        }
    }
}
