//! Illegal connection state transitions.

use thiserror::Error;

/// Returned by the connection state machine when an event does not apply to
/// the current state. The state is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply `{event}` while {from}")]
pub struct TransitionError {
    /// Name of the state the machine was in.
    pub from: &'static str,
    /// Name of the rejected event.
    pub event: &'static str,
}
