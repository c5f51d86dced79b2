//! Scripted transport for testing.
//!
//! Each `connect` call consumes the next scripted [`ConnectOutcome`]
//! (accepting by default once the script is empty). Accepted sessions are
//! driven from the test through a [`MockSessionHandle`]: inject frames,
//! drop the connection, and inspect what the client sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::traits::{Transport, TransportEvent, TransportSession};

/// Result of one scripted handshake.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// Handshake succeeds.
    Accept,
    /// Handshake fails with `ConnectFailed`.
    Refuse(String),
    /// Handshake never completes.
    Hang,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<ConnectOutcome>,
    endpoints: Vec<String>,
    sessions: Vec<MockSessionHandle>,
    close_delay: Duration,
    max_live_at_connect: usize,
}

/// Mock transport with scripted handshakes.
///
/// # Example
///
/// ```ignore
/// let transport = MockTransport::new();
/// transport.refuse_next(2);
/// transport.push_outcome(ConnectOutcome::Accept);
///
/// // ... subscribe, then drive the accepted session
/// let session = transport.session(0).unwrap();
/// session.send_text(r#"{"type":"metrics_update","payload":{"cpu_usage":42}}"#);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&self, outcome: ConnectOutcome) {
        self.lock().script.push_back(outcome);
    }

    /// Script `count` refused handshakes.
    pub fn refuse_next(&self, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state
                .script
                .push_back(ConnectOutcome::Refuse("connection refused".to_string()));
        }
    }

    /// Make every later session take `delay` to close.
    pub fn set_close_delay(&self, delay: Duration) {
        self.lock().close_delay = delay;
    }

    /// Most sessions the client still held when a handshake started.
    pub fn max_live_at_connect(&self) -> usize {
        self.lock().max_live_at_connect
    }

    /// Number of handshakes attempted so far.
    pub fn connect_count(&self) -> usize {
        self.lock().endpoints.len()
    }

    /// Endpoints passed to `connect`, in order.
    pub fn endpoints(&self) -> Vec<String> {
        self.lock().endpoints.clone()
    }

    /// Handle to the `index`-th accepted session.
    pub fn session(&self, index: usize) -> Option<MockSessionHandle> {
        self.lock().sessions.get(index).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Sessions the client still holds.
    pub fn live_sessions(&self) -> usize {
        self.lock()
            .sessions
            .iter()
            .filter(|s| !s.is_released())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn TransportSession>, TransportError> {
        let (outcome, close_delay) = {
            let mut state = self.lock();
            state.endpoints.push(endpoint.to_string());
            let live = state.sessions.iter().filter(|s| !s.is_released()).count();
            state.max_live_at_connect = state.max_live_at_connect.max(live);
            let outcome = state.script.pop_front().unwrap_or(ConnectOutcome::Accept);
            (outcome, state.close_delay)
        };

        match outcome {
            ConnectOutcome::Accept => {
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                let handle = MockSessionHandle {
                    events: events_tx,
                    sent: Arc::new(Mutex::new(Vec::new())),
                    closed_by_client: Arc::new(AtomicBool::new(false)),
                    released: Arc::new(AtomicBool::new(false)),
                };
                let session = MockSession {
                    events: events_rx,
                    handle: handle.clone(),
                    close_delay,
                };
                self.lock().sessions.push(handle);
                Ok(Box::new(session))
            }
            ConnectOutcome::Refuse(message) => Err(TransportError::ConnectFailed {
                endpoint: endpoint.to_string(),
                message,
            }),
            ConnectOutcome::Hang => std::future::pending().await,
        }
    }
}

/// Test-side control of one accepted session.
#[derive(Clone)]
pub struct MockSessionHandle {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    closed_by_client: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl MockSessionHandle {
    /// Deliver a text frame to the client.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Text(text.into()));
    }

    pub fn send_binary(&self, data: Vec<u8>) {
        let _ = self.events.send(TransportEvent::Binary(data));
    }

    /// Simulate the server closing the connection.
    pub fn drop_connection(&self) {
        let _ = self.events.send(TransportEvent::Lost(TransportError::Closed {
            code: Some(1006),
            reason: None,
        }));
    }

    /// Simulate a network error on the open connection.
    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Lost(TransportError::Stream {
            message: message.into(),
        }));
    }

    /// Text frames the client sent on this session.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// True once the client called `close`.
    pub fn is_closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }

    /// True once the client dropped the session.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

struct MockSession {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    handle: MockSessionHandle,
    close_delay: Duration,
}

#[async_trait]
impl TransportSession for MockSession {
    async fn recv(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Lost(TransportError::Closed {
                code: None,
                reason: None,
            }),
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.handle
            .sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.handle.closed_by_client.store(true, Ordering::SeqCst);
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.handle.released.store(true, Ordering::SeqCst);
    }
}
