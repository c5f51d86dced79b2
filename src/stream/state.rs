//! Connection lifecycle.
//!
//! [`ConnectionState`] is the tagged state consumers observe.
//! [`ConnectionMachine`] owns the state plus the consecutive-failure counter
//! and applies lifecycle events; it performs no I/O so every transition can be
//! exercised without a transport.
//!
//! ```text
//!   Idle ──subscribe/reconnect──▶ Connecting ──opened──▶ Open
//!                                   ▲   │                  │
//!                        retry_due  │   │ transport_lost   │ transport_lost
//!                                   │   ▼                  ▼
//!                                  Retrying ◀──────────────┘
//!                                   │
//!                                   └─retry_due (ceiling reached)──▶ Failed
//!   Failed ──reconnect──▶ Connecting        any ──stop──▶ Idle
//! ```
//!
//! `Failed` is only entered from `Retrying`. A fault no retry can fix still
//! passes through `Retrying`, with a zero delay.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use super::backoff::BackoffPolicy;
use crate::error::TransitionError;

/// Lifecycle of one logical stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConnectionState {
    /// No transport and nothing scheduled.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Transport open; frames flowing.
    Open,
    /// Waiting out a backoff delay before the next handshake.
    Retrying {
        /// Consecutive failures so far (1 for the first retry).
        attempt: u32,
        delay: Duration,
        next_retry_at: Instant,
    },
    /// Retries exhausted. Only a manual reconnect leaves this state.
    Failed { reason: String },
}

impl ConnectionState {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Retrying { .. } => "retrying",
            ConnectionState::Failed { .. } => "failed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConnectionState::Failed { .. })
    }

    /// True while the client is trying to get to `Open` on its own.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Retrying { .. }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Retrying { attempt, delay, .. } => {
                write!(f, "retrying (attempt {}, in {}ms)", attempt, delay.as_millis())
            }
            ConnectionState::Failed { reason } => write!(f, "failed: {}", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Pure connection state machine.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    failures: u32,
    policy: BackoffPolicy,
    /// Reason given by the most recent failure.
    last_reason: String,
    /// Set by `give_up`: the pending retry resolves to `Failed`.
    fatal: bool,
}

impl ConnectionMachine {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            failures: 0,
            policy,
            last_reason: String::new(),
            fatal: false,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Consecutive failures since the last successful open.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// `Idle → Connecting` when a subscription starts.
    pub fn start(&mut self) -> Result<&ConnectionState, TransitionError> {
        match self.state {
            ConnectionState::Idle => self.enter(ConnectionState::Connecting),
            _ => Err(self.reject("start")),
        }
    }

    /// `Connecting → Open`. Resets the failure counter.
    pub fn opened(&mut self) -> Result<&ConnectionState, TransitionError> {
        match self.state {
            ConnectionState::Connecting => {
                self.failures = 0;
                self.enter(ConnectionState::Open)
            }
            _ => Err(self.reject("opened")),
        }
    }

    /// `Connecting/Open → Retrying`.
    ///
    /// The delay is computed from the failure count before it is incremented,
    /// so the first retry uses attempt 0. The ceiling is checked when the
    /// delay runs out, in [`retry_due`](Self::retry_due).
    pub fn transport_lost(
        &mut self,
        reason: &str,
        now: Instant,
    ) -> Result<&ConnectionState, TransitionError> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                let delay = self.policy.delay_for(self.failures);
                self.failures = self.failures.saturating_add(1);
                self.last_reason = reason.to_string();
                self.enter(ConnectionState::Retrying {
                    attempt: self.failures,
                    delay,
                    next_retry_at: now + delay,
                })
            }
            _ => Err(self.reject("transport_lost")),
        }
    }

    /// `Connecting/Open → Retrying` with no delay, for faults no retry can
    /// fix. The following `retry_due` yields `Failed` with `reason`.
    pub fn give_up(
        &mut self,
        reason: &str,
        now: Instant,
    ) -> Result<&ConnectionState, TransitionError> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                self.failures = self.failures.saturating_add(1);
                self.last_reason = reason.to_string();
                self.fatal = true;
                self.enter(ConnectionState::Retrying {
                    attempt: self.failures,
                    delay: Duration::ZERO,
                    next_retry_at: now,
                })
            }
            _ => Err(self.reject("give_up")),
        }
    }

    /// True when the pending retry will resolve to `Failed`.
    pub fn is_exhausted(&self) -> bool {
        self.fatal || self.policy.is_exhausted(self.failures)
    }

    /// `Retrying → Connecting` once the delay has elapsed, or
    /// `Retrying → Failed` when the ceiling has been reached.
    pub fn retry_due(&mut self) -> Result<&ConnectionState, TransitionError> {
        match self.state {
            ConnectionState::Retrying { .. } if self.fatal => {
                let reason = self.last_reason.clone();
                self.enter(ConnectionState::Failed { reason })
            }
            ConnectionState::Retrying { .. } if self.policy.is_exhausted(self.failures) => {
                let reason = format!(
                    "gave up after {} consecutive failures: {}",
                    self.failures, self.last_reason
                );
                self.enter(ConnectionState::Failed { reason })
            }
            ConnectionState::Retrying { .. } => self.enter(ConnectionState::Connecting),
            _ => Err(self.reject("retry_due")),
        }
    }

    /// Manual reconnect from `Idle`, `Retrying`, or `Failed`. Resets the
    /// failure counter.
    pub fn reconnect(&mut self) -> Result<&ConnectionState, TransitionError> {
        match self.state {
            ConnectionState::Idle
            | ConnectionState::Retrying { .. }
            | ConnectionState::Failed { .. } => {
                self.failures = 0;
                self.fatal = false;
                self.enter(ConnectionState::Connecting)
            }
            _ => Err(self.reject("reconnect")),
        }
    }

    /// Any state `→ Idle`.
    pub fn stop(&mut self) -> &ConnectionState {
        self.state = ConnectionState::Idle;
        &self.state
    }

    fn enter(&mut self, next: ConnectionState) -> Result<&ConnectionState, TransitionError> {
        self.state = next;
        Ok(&self.state)
    }

    fn reject(&self, event: &'static str) -> TransitionError {
        TransitionError {
            from: self.state.name(),
            event,
        }
    }
}
