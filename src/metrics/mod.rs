//! Telemetry snapshot model.
//!
//! A [`MetricsSnapshot`] is the merged view of every telemetry frame received
//! on one subscription. Frames carry partial [`MetricsUpdate`]s that are folded
//! in field by field with [`apply_update`]; progress frames fold into
//! [`BenchmarkProgress`]; throughput samples are retained in a bounded
//! [`History`].

pub mod history;
pub mod progress;
pub mod snapshot;
pub mod update;

pub use history::{History, ThroughputSample, DEFAULT_HISTORY_CAPACITY};
pub use progress::{BenchmarkProgress, ProgressUpdate};
pub use snapshot::{apply_update, GpuReading, GpuStats, MetricsSnapshot};
pub use update::{parse_timestamp, MetricsUpdate};
