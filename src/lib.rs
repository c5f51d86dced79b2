//! benchscope - real-time GPU telemetry streaming client
//!
//! Subscribes to a benchmark dashboard's telemetry stream, keeps a merged
//! [`MetricsSnapshot`](metrics::MetricsSnapshot) per subscription, and
//! reconnects with configurable backoff when the transport drops.
//!
//! ```ignore
//! use std::sync::Arc;
//! use benchscope::adapters::TungsteniteTransport;
//! use benchscope::config::TelemetryConfig;
//! use benchscope::stream::TelemetryClient;
//!
//! let config = TelemetryConfig::from_env();
//! let client = TelemetryClient::from_config(Arc::new(TungsteniteTransport::new()), &config);
//! let subscription = client.subscribe(config.metrics_endpoint()?, config.retry.clone());
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod stream;
pub mod traits;
