//! Mock implementations for testing.
//!
//! - [`MockTransport`] - scripted handshakes with per-session control

pub mod transport;

pub use transport::{ConnectOutcome, MockSessionHandle, MockTransport};
