//! Consumer-facing watch channels plus the generation guard.
//!
//! Every driver task publishes through an [`Emitter`] stamped with its
//! generation. Only the live generation may publish; retiring a generation
//! and resetting the channels happen under one lock, so a driver that is
//! still unwinding can never overwrite the reset.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::state::ConnectionState;
use crate::metrics::MetricsSnapshot;

/// Generation value meaning "no driver may publish".
const RETIRED: u64 = 0;

pub(crate) struct Channels {
    state: watch::Sender<ConnectionState>,
    snapshot: watch::Sender<Option<Arc<MetricsSnapshot>>>,
    last_error: watch::Sender<Option<String>>,
    live: Mutex<u64>,
}

impl Channels {
    pub(crate) fn new() -> Self {
        Self {
            state: watch::Sender::new(ConnectionState::Idle),
            snapshot: watch::Sender::new(None),
            last_error: watch::Sender::new(None),
            live: Mutex::new(RETIRED),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub(crate) fn snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn watch_snapshot(&self) -> watch::Receiver<Option<Arc<MetricsSnapshot>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn watch_last_error(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    /// Make `generation` the only one allowed to publish.
    pub(crate) fn activate(&self, generation: u64) {
        *self.lock_live() = generation;
    }

    /// Retire the live generation and reset to `Idle` with no snapshot.
    ///
    /// Receivers are only notified for values that actually change.
    pub(crate) fn retire(&self) {
        let mut live = self.lock_live();
        *live = RETIRED;
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Idle {
                false
            } else {
                *state = ConnectionState::Idle;
                true
            }
        });
        self.snapshot.send_if_modified(|snapshot| snapshot.take().is_some());
        self.last_error.send_if_modified(|error| error.take().is_some());
    }

    fn lock_live(&self) -> MutexGuard<'_, u64> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publishing half held by one driver generation.
pub(crate) struct Emitter {
    channels: Arc<Channels>,
    generation: u64,
}

impl Emitter {
    pub(crate) fn new(channels: Arc<Channels>, generation: u64) -> Self {
        Self {
            channels,
            generation,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false when this generation has been retired.
    pub(crate) fn state(&self, state: ConnectionState) -> bool {
        self.publish(|channels| {
            channels.state.send_replace(state);
        })
    }

    pub(crate) fn snapshot(&self, snapshot: Arc<MetricsSnapshot>) -> bool {
        self.publish(|channels| {
            channels.snapshot.send_replace(Some(snapshot));
        })
    }

    pub(crate) fn last_error(&self, error: Option<String>) -> bool {
        self.publish(|channels| {
            channels
                .last_error
                .send_if_modified(|current| {
                    if *current == error {
                        false
                    } else {
                        *current = error;
                        true
                    }
                });
        })
    }

    fn publish(&self, write: impl FnOnce(&Channels)) -> bool {
        let live = self.channels.lock_live();
        if *live != self.generation {
            return false;
        }
        write(&self.channels);
        true
    }
}
