//! Read-only consumer view of a subscription.

use std::sync::{Arc, Weak};

use tokio::sync::watch;

use super::state::ConnectionState;
use super::subscription::SubscriptionInner;
use crate::metrics::MetricsSnapshot;

/// Cloneable read handle over a [`Subscription`](super::Subscription).
///
/// Views never open transports and do not keep the subscription alive.
#[derive(Clone)]
pub struct TelemetryView {
    state: watch::Receiver<ConnectionState>,
    snapshot: watch::Receiver<Option<Arc<MetricsSnapshot>>>,
    last_error: watch::Receiver<Option<String>>,
    subscription: Weak<SubscriptionInner>,
}

impl TelemetryView {
    pub(crate) fn new(inner: &Arc<SubscriptionInner>) -> Self {
        let channels = inner.channels();
        Self {
            state: channels.watch_state(),
            snapshot: channels.watch_snapshot(),
            last_error: channels.watch_last_error(),
            subscription: Arc::downgrade(inner),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.snapshot.borrow().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_open()
    }

    /// Wait until state, snapshot, or last error changes.
    ///
    /// Returns false once the subscription and its driver are gone.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            result = self.state.changed() => result.is_ok(),
            result = self.snapshot.changed() => result.is_ok(),
            result = self.last_error.changed() => result.is_ok(),
        }
    }

    /// Wait until the connection state satisfies `predicate`.
    pub async fn wait_for_state(
        &mut self,
        predicate: impl FnMut(&ConnectionState) -> bool,
    ) -> Option<ConnectionState> {
        self.state
            .wait_for(predicate)
            .await
            .ok()
            .map(|state| state.clone())
    }

    /// Ask the owning subscription to reconnect. No-op once it is dropped.
    pub fn reconnect(&self) {
        if let Some(inner) = self.subscription.upgrade() {
            inner.reconnect();
        }
    }
}

impl std::fmt::Debug for TelemetryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryView")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
