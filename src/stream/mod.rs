//! Streaming telemetry client.
//!
//! [`TelemetryClient::subscribe`] returns a [`Subscription`] backed by a
//! single driver task. The driver runs the [`ConnectionMachine`], realizes
//! [`BackoffPolicy`] delays, decodes [`InboundFrame`]s, and folds them into a
//! [`MetricsSnapshot`](crate::metrics::MetricsSnapshot). Consumers read the
//! results through [`TelemetryView`]s or share subscriptions through a
//! [`SubscriptionRegistry`].

pub mod backoff;
mod channels;
pub mod client;
mod driver;
pub mod messages;
pub mod registry;
pub mod state;
pub mod subscription;
pub mod view;

pub use backoff::{BackoffPolicy, BackoffStrategy};
pub use client::TelemetryClient;
pub use driver::RETRIES_EXHAUSTED;
pub use messages::{InboundFrame, OutboundMessage};
pub use registry::SubscriptionRegistry;
pub use state::{ConnectionMachine, ConnectionState};
pub use subscription::Subscription;
pub use view::TelemetryView;
