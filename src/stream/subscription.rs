//! Consumer handle for one logical stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backoff::BackoffPolicy;
use super::channels::{Channels, Emitter};
use super::driver::{Command, Driver};
use super::state::ConnectionState;
use super::view::TelemetryView;
use crate::metrics::MetricsSnapshot;
use crate::traits::Transport;

struct DriverHandle {
    generation: u64,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

pub(crate) struct SubscriptionInner {
    id: Uuid,
    endpoint: String,
    policy: BackoffPolicy,
    history_capacity: usize,
    transport: Arc<dyn Transport>,
    channels: Arc<Channels>,
    next_generation: AtomicU64,
    driver: Mutex<Option<DriverHandle>>,
    /// Task of the last unsubscribed generation, awaited by the next one
    /// before it connects.
    retiring: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionInner {
    pub(crate) fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Reconnect, spawning a new driver generation if the last one is gone.
    pub(crate) fn reconnect(&self) {
        let mut driver = self.lock_driver();
        if let Some(handle) = driver.as_ref() {
            if handle.commands.send(Command::Reconnect).is_ok() {
                return;
            }
        }
        info!(
            subscription = %self.id,
            endpoint = %self.endpoint,
            "Resubscribing"
        );
        *driver = Some(self.spawn_driver());
    }

    fn unsubscribe(&self) {
        let Some(handle) = self.lock_driver().take() else {
            return;
        };
        debug!(
            subscription = %self.id,
            generation = handle.generation,
            "Retiring driver"
        );
        self.channels.retire();
        // The driver may already be gone; the channels are reset either way.
        let _ = handle.commands.send(Command::Unsubscribe);
        *lock(&self.retiring) = Some(handle.task);
    }

    fn spawn_driver(&self) -> DriverHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.channels.activate(generation);

        let (commands, rx) = mpsc::unbounded_channel();
        let mut driver = Driver::new(
            self.id,
            self.endpoint.clone(),
            Arc::clone(&self.transport),
            self.policy.clone(),
            self.history_capacity,
            Emitter::new(Arc::clone(&self.channels), generation),
            rx,
        );
        driver.start();
        let previous = lock(&self.retiring).take();
        let task = tokio::spawn(driver.run(previous));

        DriverHandle {
            generation,
            commands,
            task,
        }
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<DriverHandle>> {
        lock(&self.driver)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live subscription to one telemetry endpoint.
///
/// Owns at most one transport at a time. Dropping the handle unsubscribes.
///
/// # Example
///
/// ```ignore
/// let subscription = client.subscribe("ws://localhost:7000/metrics", BackoffPolicy::default());
/// let mut view = subscription.view();
/// while view.changed().await {
///     if let Some(snapshot) = view.snapshot() {
///         println!("cpu: {:?}", snapshot.cpu_usage);
///     }
/// }
/// ```
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Must be called inside a tokio runtime.
    pub(crate) fn spawn(
        endpoint: String,
        policy: BackoffPolicy,
        history_capacity: usize,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let inner = Arc::new(SubscriptionInner {
            id: Uuid::new_v4(),
            endpoint,
            policy,
            history_capacity,
            transport,
            channels: Arc::new(Channels::new()),
            next_generation: AtomicU64::new(1),
            driver: Mutex::new(None),
            retiring: Mutex::new(None),
        });
        info!(
            subscription = %inner.id,
            endpoint = %inner.endpoint,
            "Subscribing"
        );
        let handle = inner.spawn_driver();
        *inner.lock_driver() = Some(handle);
        Self { inner }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.inner.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.channels.state()
    }

    /// Latest merged snapshot; `None` until the first recognized frame.
    pub fn snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.inner.channels.snapshot()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.channels.last_error()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.channels.watch_state()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Option<Arc<MetricsSnapshot>>> {
        self.inner.channels.watch_snapshot()
    }

    /// Read handle that does not keep the subscription alive.
    pub fn view(&self) -> TelemetryView {
        TelemetryView::new(&self.inner)
    }

    /// Serialize `message` as JSON and send it.
    ///
    /// Best effort: returns false and drops the message unless the stream
    /// is open.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        if !self.is_connected() {
            debug!(
                subscription = %self.inner.id,
                "Dropping outbound message: not connected"
            );
            return false;
        }
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(subscription = %self.inner.id, "Failed to serialize message: {}", e);
                return false;
            }
        };
        match self.inner.lock_driver().as_ref() {
            Some(handle) => handle.commands.send(Command::Send(text)).is_ok(),
            None => false,
        }
    }

    /// Reconnect now, resetting the failure counter.
    ///
    /// No-op while connecting or open. After [`unsubscribe`](Self::unsubscribe)
    /// this starts a fresh stream.
    pub fn reconnect(&self) {
        self.inner.reconnect();
    }

    /// Close the transport, cancel any pending retry, and reset to `Idle`
    /// with no snapshot. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        self.inner.unsubscribe();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.state())
            .finish()
    }
}
