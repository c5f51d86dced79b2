//! Wire format of the telemetry channel.
//!
//! Inbound frames are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "metrics_update", "payload": {"cpu_usage": 42}}
//! {"type": "benchmark_progress", "payload": {"completed": 10, "total": 100}}
//! ```
//!
//! The dashboard backend also sends the body under `metrics` or `progress`
//! with a top-level `timestamp`; both layouts decode to the same frame.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FrameError;
use crate::metrics::{parse_timestamp, MetricsUpdate, ProgressUpdate};

pub const METRICS_UPDATE: &str = "metrics_update";
pub const BENCHMARK_PROGRESS: &str = "benchmark_progress";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    MetricsUpdate(MetricsUpdate),
    BenchmarkProgress(ProgressUpdate),
    /// A well-formed frame whose type this client does not handle.
    Unrecognized { frame_type: String },
}

impl InboundFrame {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(frame) = value else {
            return Err(FrameError::NotAnObject);
        };
        let frame_type = frame
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingType)?;

        match frame_type {
            METRICS_UPDATE => {
                let body = body(&frame, frame_type, "metrics")?;
                let mut update = MetricsUpdate::from_object(body);
                if update.timestamp.is_none() {
                    update.timestamp = frame.get("timestamp").and_then(parse_timestamp);
                }
                Ok(InboundFrame::MetricsUpdate(update))
            }
            BENCHMARK_PROGRESS => {
                let body = body(&frame, frame_type, "progress")?;
                Ok(InboundFrame::BenchmarkProgress(ProgressUpdate::from_object(
                    body,
                )))
            }
            other => Ok(InboundFrame::Unrecognized {
                frame_type: other.to_string(),
            }),
        }
    }

    pub fn frame_type(&self) -> &str {
        match self {
            InboundFrame::MetricsUpdate(_) => METRICS_UPDATE,
            InboundFrame::BenchmarkProgress(_) => BENCHMARK_PROGRESS,
            InboundFrame::Unrecognized { frame_type } => frame_type,
        }
    }
}

/// Locate the frame body under `payload`, falling back to `legacy_key`.
fn body<'a>(
    frame: &'a Map<String, Value>,
    frame_type: &str,
    legacy_key: &str,
) -> Result<&'a Map<String, Value>, FrameError> {
    match frame.get("payload").or_else(|| frame.get(legacy_key)) {
        Some(Value::Object(body)) => Ok(body),
        _ => Err(FrameError::InvalidPayload {
            frame_type: frame_type.to_string(),
        }),
    }
}

/// Control messages the client sends to the telemetry server. Anything
/// else can go through `Subscription::send` as a plain serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Ask the server to push a full snapshot now.
    RequestSnapshot,
}
