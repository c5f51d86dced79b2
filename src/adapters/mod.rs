//! Concrete implementations of trait abstractions.
//!
//! - [`TungsteniteTransport`] - WebSocket using tokio-tungstenite
//!
//! The [`mock`] submodule provides a scripted [`mock::MockTransport`] for
//! exercising reconnection without a network.

pub mod mock;
pub mod tungstenite_ws;

pub use mock::{ConnectOutcome, MockSessionHandle, MockTransport};
pub use tungstenite_ws::{TungsteniteSession, TungsteniteTransport};
