//! Endpoint-keyed subscription sharing.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::backoff::BackoffPolicy;
use super::client::TelemetryClient;
use super::subscription::Subscription;
use super::view::TelemetryView;

/// Shares one subscription per endpoint between any number of views.
///
/// Dropping the registry unsubscribes everything it holds.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    client: TelemetryClient,
    policy: BackoffPolicy,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new(client: TelemetryClient, policy: BackoffPolicy) -> Self {
        Self {
            client,
            policy,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// View of `endpoint`, subscribing on first use.
    pub fn view(&self, endpoint: &str) -> TelemetryView {
        let mut subscriptions = self.lock();
        if let Some(subscription) = subscriptions.get(endpoint) {
            return subscription.view();
        }
        debug!(endpoint, "Registry subscribing");
        let subscription = self.client.subscribe(endpoint, self.policy.clone());
        let view = subscription.view();
        subscriptions.insert(endpoint.to_string(), subscription);
        view
    }

    /// Unsubscribe from `endpoint`. Returns false if nothing was held.
    pub fn release(&self, endpoint: &str) -> bool {
        let removed = self.lock().remove(endpoint);
        match removed {
            Some(subscription) => {
                subscription.unsubscribe();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.lock().contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
