//! Entry point for opening telemetry subscriptions.

use std::sync::Arc;

use super::backoff::BackoffPolicy;
use super::subscription::Subscription;
use crate::config::TelemetryConfig;
use crate::metrics::DEFAULT_HISTORY_CAPACITY;
use crate::traits::Transport;

/// Opens subscriptions over a shared [`Transport`].
///
/// Each subscription gets its own session; the transport only performs
/// handshakes.
#[derive(Clone)]
pub struct TelemetryClient {
    transport: Arc<dyn Transport>,
    history_capacity: usize,
}

impl TelemetryClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &TelemetryConfig) -> Self {
        Self::new(transport).with_history_capacity(config.history_capacity)
    }

    /// Samples of throughput history each snapshot retains.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Start streaming from `endpoint`.
    ///
    /// Returns immediately in `Connecting`. Must be called inside a tokio
    /// runtime.
    pub fn subscribe(&self, endpoint: impl Into<String>, policy: BackoffPolicy) -> Subscription {
        Subscription::spawn(
            endpoint.into(),
            policy,
            self.history_capacity,
            Arc::clone(&self.transport),
        )
    }
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("history_capacity", &self.history_capacity)
            .finish_non_exhaustive()
    }
}
