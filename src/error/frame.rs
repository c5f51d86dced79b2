//! Frame decode errors.
//!
//! A decode fault is a data-level problem with one inbound frame. It is logged
//! and the frame is dropped; connection state and the snapshot are untouched.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// The frame body is not valid JSON.
    #[error("invalid JSON in frame: {message}")]
    InvalidJson { message: String },

    /// The frame is JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// The frame has no string `type` discriminator.
    #[error("frame has no `type` field")]
    MissingType,

    /// A recognized frame carried a payload that is not an object.
    #[error("`{frame_type}` frame payload is not an object")]
    InvalidPayload { frame_type: String },

    /// A binary frame arrived on a text-only channel.
    #[error("unexpected binary frame ({len} bytes)")]
    Binary { len: usize },
}

impl FrameError {
    pub fn error_code(&self) -> &'static str {
        match self {
            FrameError::InvalidJson { .. } => "E_FRAME_JSON",
            FrameError::NotAnObject => "E_FRAME_SHAPE",
            FrameError::MissingType => "E_FRAME_TYPE",
            FrameError::InvalidPayload { .. } => "E_FRAME_PAYLOAD",
            FrameError::Binary { .. } => "E_FRAME_BINARY",
        }
    }

    pub fn user_message(&self) -> String {
        "Received invalid data from the telemetry server".to_string()
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        FrameError::InvalidJson {
            message: err.to_string(),
        }
    }
}
