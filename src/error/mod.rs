//! Error handling for the telemetry client.
//!
//! - **Error Categories**: classification that drives retry decisions
//! - **Domain-specific Errors**: transport, frame decode, configuration, and
//!   state-transition errors
//! - **Unified Error Type**: `TelemetryError` consolidates all of them
//!
//! | Category | Source | Effect on the stream |
//! |----------|--------|----------------------|
//! | Network | connect failure, reset, timeout | retry with backoff |
//! | Server | close frame, rejected upgrade | retry with backoff |
//! | Protocol | malformed frame | frame dropped, logged |
//! | Client | illegal state transition | event ignored, logged |
//! | Configuration | bad endpoint or retry settings | startup fails |
//!
//! Streaming operations never hand these to consumers as `Err`; they surface
//! as connection state plus a last-error string.

mod category;
mod config;
mod frame;
mod result;
mod telemetry_error;
mod transition;
mod transport;

pub use category::ErrorCategory;
pub use config::ConfigError;
pub use frame::FrameError;
pub use result::TelemetryResult;
pub use telemetry_error::TelemetryError;
pub use transition::TransitionError;
pub use transport::{classify_connect_error, classify_stream_error, TransportError};
