//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`Transport`] - opens duplex message sessions to a telemetry endpoint
//! - [`TransportSession`] - one open session: receive, send, close

pub mod transport;

pub use transport::{Transport, TransportEvent, TransportSession};
