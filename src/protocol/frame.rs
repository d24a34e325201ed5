//! Wire frame and codec.
//!
//! Every message in either direction is a JSON object:
//!
//! ```json
//! { "type": "new_message", "payload": { ... } }
//! ```
//!
//! [`FrameCodec`] is the only place raw text is turned into frames and back.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, to_string};

use crate::error::{Error, Result};

// ============================================================================
// Frame
// ============================================================================

/// One message exchanged over the connection, tagged with a `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Message type name.
    #[serde(rename = "type")]
    pub frame_type: String,

    /// Type-dependent payload. `null` when absent on the wire.
    #[serde(default)]
    pub payload: Value,
}

impl Frame {
    /// Creates a frame.
    #[inline]
    #[must_use]
    pub fn new(frame_type: impl Into<String>, payload: Value) -> Self {
        Self {
            frame_type: frame_type.into(),
            payload,
        }
    }

    /// Returns the type name.
    #[inline]
    #[must_use]
    pub fn frame_type(&self) -> &str {
        &self.frame_type
    }
}

// ============================================================================
// FrameCodec
// ============================================================================

/// Encodes outbound messages and decodes/validates inbound text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Decodes inbound text into a [`Frame`].
    ///
    /// # Errors
    ///
    /// [`Error::MalformedFrame`] if the text is not a JSON object with a
    /// non-empty string `type`.
    pub fn decode(text: &str) -> Result<Frame> {
        let value: Value = from_str(text).map_err(|e| Error::malformed_frame(e.to_string()))?;
        if !value.is_object() {
            return Err(Error::malformed_frame("frame is not a JSON object"));
        }

        let frame = Frame::deserialize(value).map_err(|e| Error::malformed_frame(e.to_string()))?;

        if frame.frame_type.trim().is_empty() {
            return Err(Error::malformed_frame("empty frame type"));
        }

        Ok(frame)
    }

    /// Encodes an outbound message ([`Frame`] or
    /// [`Command`](super::Command)) to wire text.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if serialization fails.
    pub fn encode<T: Serialize>(message: &T) -> Result<String> {
        Ok(to_string(message)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
