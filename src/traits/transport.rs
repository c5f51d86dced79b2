//! Transport trait abstraction.
//!
//! The streaming client only needs message-based duplex delivery with
//! open/message/error/close events. These traits capture exactly that, so the
//! production WebSocket adapter and the scripted test double are
//! interchangeable.

use async_trait::async_trait;

use crate::error::TransportError;

/// Event produced by an open transport session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A text frame.
    Text(String),
    /// A binary frame. The telemetry channel is text-only.
    Binary(Vec<u8>),
    /// The session closed or failed. No further events follow.
    Lost(TransportError),
}

/// Opens transport sessions to an endpoint.
///
/// # Example
///
/// ```ignore
/// use benchscope::traits::{Transport, TransportEvent};
///
/// async fn first_frame<T: Transport>(transport: &T) -> Option<String> {
///     let mut session = transport.connect("ws://localhost:8000/metrics").await.ok()?;
///     match session.recv().await {
///         TransportEvent::Text(text) => Some(text),
///         _ => None,
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the handshake with `endpoint`.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn TransportSession>, TransportError>;
}

/// One open transport, exclusively owned by a subscription.
#[async_trait]
pub trait TransportSession: Send {
    /// Wait for the next event.
    ///
    /// Must be cancel safe: the client races this against its command
    /// channel and drops the future when a command wins.
    async fn recv(&mut self) -> TransportEvent;

    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the session. Errors are swallowed; the session is gone either way.
    async fn close(&mut self);
}
