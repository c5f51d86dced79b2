//! Per-subscription driver task.
//!
//! One task per live subscription generation. It owns the transport session,
//! the [`ConnectionMachine`], and the working snapshot, and it is the only
//! writer of all three. The [`Subscription`](super::Subscription) handle talks
//! to it over an unbounded command channel.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::backoff::BackoffPolicy;
use super::channels::Emitter;
use super::messages::InboundFrame;
use super::state::{ConnectionMachine, ConnectionState};
use crate::error::{FrameError, TelemetryError, TransitionError, TransportError};
use crate::metrics::MetricsSnapshot;
use crate::traits::{Transport, TransportEvent, TransportSession};

/// Last-error text once the retry ceiling is hit.
pub const RETRIES_EXHAUSTED: &str = "Maximum retry attempts reached";

/// Requests from the subscription handle.
#[derive(Debug)]
pub(crate) enum Command {
    /// Serialized outbound frame.
    Send(String),
    Reconnect,
    Unsubscribe,
}

enum Flow {
    Continue,
    Stop,
}

pub(crate) struct Driver {
    id: Uuid,
    endpoint: String,
    transport: Arc<dyn Transport>,
    machine: ConnectionMachine,
    snapshot: MetricsSnapshot,
    published: bool,
    /// User-facing message of a fault no retry can fix.
    fatal_message: Option<String>,
    emitter: Emitter,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Driver {
    pub(crate) fn new(
        id: Uuid,
        endpoint: String,
        transport: Arc<dyn Transport>,
        policy: BackoffPolicy,
        history_capacity: usize,
        emitter: Emitter,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            id,
            endpoint,
            transport,
            machine: ConnectionMachine::new(policy),
            snapshot: MetricsSnapshot::with_history_capacity(history_capacity),
            published: false,
            fatal_message: None,
            emitter,
            commands,
        }
    }

    /// `Idle → Connecting`, published before the task is spawned so callers
    /// observe `Connecting` as soon as `subscribe` returns.
    pub(crate) fn start(&mut self) {
        let outcome = self.machine.start().map(|_| ());
        self.commit(outcome);
    }

    /// Drive the stream until unsubscribed. `previous` is the task of the
    /// generation this one replaces; no handshake starts before it finishes.
    pub(crate) async fn run(mut self, previous: Option<JoinHandle<()>>) {
        debug!(
            subscription = %self.id,
            generation = self.emitter.generation(),
            "Driver started"
        );
        let mut flow = match previous {
            Some(previous) => self.await_previous(previous).await,
            None => Flow::Continue,
        };
        while let Flow::Continue = flow {
            flow = match self.machine.state().clone() {
                ConnectionState::Connecting => self.connect().await,
                ConnectionState::Retrying { next_retry_at, .. } => {
                    self.wait_for_retry(next_retry_at).await
                }
                ConnectionState::Failed { .. } => self.wait_for_reconnect().await,
                ConnectionState::Open | ConnectionState::Idle => Flow::Stop,
            };
        }
        self.machine.stop();
        info!(
            subscription = %self.id,
            endpoint = %self.endpoint,
            "Unsubscribed"
        );
    }

    /// Wait for the retired generation to release its transport. An
    /// unsubscribe arriving meanwhile still waits, so generations never
    /// overlap.
    async fn await_previous(&mut self, mut previous: JoinHandle<()>) -> Flow {
        debug!(subscription = %self.id, "Waiting for previous driver to close");
        let mut flow = Flow::Continue;
        loop {
            tokio::select! {
                _ = &mut previous => return flow,
                command = self.commands.recv(), if matches!(flow, Flow::Continue) => {
                    flow = self.idle_command(command, false);
                }
            }
        }
    }

    async fn connect(&mut self) -> Flow {
        let transport = Arc::clone(&self.transport);
        let endpoint = self.endpoint.clone();
        let handshake = async move { transport.connect(&endpoint).await };
        tokio::pin!(handshake);

        loop {
            tokio::select! {
                result = &mut handshake => {
                    return match result {
                        Ok(session) => {
                            self.emitter.last_error(None);
                            let outcome = self.machine.opened().map(|_| ());
                            self.commit(outcome);
                            self.stream(session).await
                        }
                        Err(e) => {
                            self.transport_lost(&e);
                            Flow::Continue
                        }
                    };
                }
                command = self.commands.recv() => {
                    // Dropping the handshake future cancels it.
                    if let Flow::Stop = self.idle_command(command, false) {
                        return Flow::Stop;
                    }
                }
            }
        }
    }

    async fn stream(&mut self, mut session: Box<dyn TransportSession>) -> Flow {
        loop {
            tokio::select! {
                event = session.recv() => match event {
                    TransportEvent::Text(text) => self.handle_frame(&text),
                    TransportEvent::Binary(data) => {
                        self.drop_frame(FrameError::Binary { len: data.len() });
                    }
                    TransportEvent::Lost(e) => {
                        self.transport_lost(&e);
                        return Flow::Continue;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = session.send_text(text).await {
                            warn!(
                                subscription = %self.id,
                                code = e.error_code(),
                                "Failed to send message: {}",
                                e
                            );
                        }
                    }
                    Some(Command::Reconnect) => {
                        debug!(subscription = %self.id, "Reconnect ignored while open");
                    }
                    Some(Command::Unsubscribe) | None => {
                        session.close().await;
                        return Flow::Stop;
                    }
                },
            }
        }
    }

    async fn wait_for_retry(&mut self, deadline: Instant) -> Flow {
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let outcome = self.machine.retry_due().map(|_| ());
                    if let ConnectionState::Failed { reason } = self.machine.state() {
                        error!(
                            subscription = %self.id,
                            endpoint = %self.endpoint,
                            attempt = self.machine.failures(),
                            "Giving up: {}",
                            reason
                        );
                        let message = self
                            .fatal_message
                            .take()
                            .unwrap_or_else(|| RETRIES_EXHAUSTED.to_string());
                        self.emitter.last_error(Some(message));
                    }
                    self.commit(outcome);
                    return Flow::Continue;
                }
                command = self.commands.recv() => {
                    let flow = self.idle_command(command, true);
                    if !matches!(self.machine.state(), ConnectionState::Retrying { .. }) {
                        return flow;
                    }
                }
            }
        }
    }

    async fn wait_for_reconnect(&mut self) -> Flow {
        loop {
            let command = self.commands.recv().await;
            let flow = self.idle_command(command, true);
            if !self.machine.state().is_failed() {
                return flow;
            }
        }
    }

    /// Handle a command while no session is open.
    fn idle_command(&mut self, command: Option<Command>, can_reconnect: bool) -> Flow {
        match command {
            Some(Command::Send(_)) => {
                debug!(
                    subscription = %self.id,
                    state = self.machine.state().name(),
                    "Dropping outbound message: not connected"
                );
                Flow::Continue
            }
            Some(Command::Reconnect) if can_reconnect => {
                info!(subscription = %self.id, "Manual reconnect");
                self.fatal_message = None;
                let outcome = self.machine.reconnect().map(|_| ());
                self.commit(outcome);
                Flow::Continue
            }
            Some(Command::Reconnect) => {
                debug!(subscription = %self.id, "Reconnect ignored while connecting");
                Flow::Continue
            }
            Some(Command::Unsubscribe) | None => {
                self.machine.stop();
                Flow::Stop
            }
        }
    }

    fn transport_lost(&mut self, e: &TransportError) {
        let reason = e.to_string();
        let now = Instant::now();
        let outcome = if e.is_retryable() {
            self.machine.transport_lost(&reason, now).map(|_| ())
        } else {
            self.fatal_message = Some(e.user_message());
            self.machine.give_up(&reason, now).map(|_| ())
        };

        if let ConnectionState::Retrying { attempt, delay, .. } = self.machine.state() {
            warn!(
                subscription = %self.id,
                endpoint = %self.endpoint,
                attempt = *attempt,
                delay_ms = delay.as_millis() as u64,
                retryable = e.is_retryable(),
                code = e.error_code(),
                "Connection lost: {}",
                e
            );
            self.emitter.last_error(Some(e.user_message()));
        }
        self.commit(outcome);
    }

    fn handle_frame(&mut self, text: &str) {
        let before = self.snapshot.version;
        match InboundFrame::decode(text) {
            Ok(InboundFrame::MetricsUpdate(update)) => {
                self.snapshot.merge(&update);
                self.snapshot.record_sample(&update, Utc::now());
            }
            Ok(InboundFrame::BenchmarkProgress(progress)) => {
                self.snapshot.merge_progress(&progress);
            }
            Ok(InboundFrame::Unrecognized { frame_type }) => {
                debug!(subscription = %self.id, frame_type = %frame_type, "Ignoring frame");
                return;
            }
            Err(e) => {
                self.drop_frame(e);
                return;
            }
        }

        if self.snapshot.version != before || !self.published {
            self.published = true;
            self.emitter.snapshot(Arc::new(self.snapshot.clone()));
        }
    }

    fn drop_frame(&self, e: FrameError) {
        warn!(
            subscription = %self.id,
            code = e.error_code(),
            "Dropping malformed frame: {}",
            e
        );
    }

    /// Publish the machine's state after a transition attempt.
    fn commit(&self, outcome: Result<(), TransitionError>) {
        match outcome {
            Ok(()) => {
                let state = self.machine.state().clone();
                info!(
                    subscription = %self.id,
                    endpoint = %self.endpoint,
                    state = %state,
                    "Connection state changed"
                );
                self.emitter.state(state);
            }
            Err(e) => {
                let err = TelemetryError::from(e);
                warn!(
                    subscription = %self.id,
                    code = err.error_code(),
                    category = %err.category(),
                    "Ignoring event: {}",
                    err
                );
            }
        }
    }
}
