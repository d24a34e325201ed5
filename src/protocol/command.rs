//! Outbound command definitions.
//!
//! Commands serialize to the same `{ "type", "payload" }` envelope as
//! [`Frame`](super::Frame):
//!
//! ```json
//! { "type": "join_conversation", "payload": { "conversationId": "c1" } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::identifiers::ConversationId;

// ============================================================================
// Command
// ============================================================================

/// Typed outbound commands issued by this core.
///
/// Anything else goes through [`Realtime::send`](crate::Realtime::send) as a
/// raw frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Command {
    /// Ask the server to stream a conversation to this client.
    JoinConversation {
        /// Conversation to join.
        #[serde(rename = "conversationId")]
        conversation_id: ConversationId,
    },
}

impl Command {
    /// Returns the wire type name.
    #[inline]
    #[must_use]
    pub const fn frame_type(&self) -> &'static str {
        match self {
            Self::JoinConversation { .. } => "join_conversation",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::protocol::FrameCodec;

    #[test]
    fn test_join_conversation_wire_format() {
        let command = Command::JoinConversation {
            conversation_id: ConversationId::new("c1"),
        };
        let text = FrameCodec::encode(&command).expect("encode");
        let value: Value = serde_json::from_str(&text).expect("valid json");

        assert_eq!(
            value,
            json!({ "type": "join_conversation", "payload": { "conversationId": "c1" } })
        );
        assert_eq!(command.frame_type(), "join_conversation");
    }
}
