//! Result alias for telemetry operations.

use super::telemetry_error::TelemetryError;

/// Type alias for Results using [`TelemetryError`].
pub type TelemetryResult<T> = Result<T, TelemetryError>;
