//! Domain values carried in frame payloads.
//!
//! Only the fields this core acts on are typed; everything else a server
//! sends along is kept verbatim in `extra` so consumers can still read it.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::{ConversationId, MessageId};

// ============================================================================
// Message
// ============================================================================

/// A chat message.
///
/// Identity is [`Message::id`]; stores deduplicate on it alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique within the conversation.
    pub id: MessageId,

    /// Owning conversation.
    #[serde(default)]
    pub conversation_id: ConversationId,

    /// Message body.
    #[serde(default)]
    pub content: Value,

    /// Fields this core does not interpret (sender, timestamps, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Creates a message with the given id.
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<MessageId>,
        conversation_id: impl Into<ConversationId>,
        content: impl Into<Value>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }

    /// Creates a message with a client-generated id, for optimistic echo
    /// before the server confirms it.
    #[inline]
    #[must_use]
    pub fn local(conversation_id: impl Into<ConversationId>, content: impl Into<Value>) -> Self {
        Self::new(MessageId::generate(), conversation_id, content)
    }

    /// Adds an uninterpreted field.
    #[inline]
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// OnlineUser
// ============================================================================

/// A counterpart user currently connected. Keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    /// Unique key.
    pub user_email: String,

    /// Display name.
    #[serde(default)]
    pub user_name: String,
}

impl OnlineUser {
    /// Creates an online user entry.
    #[inline]
    #[must_use]
    pub fn new(user_email: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            user_name: user_name.into(),
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

/// A server-pushed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification kind, e.g. `NEW_MESSAGE`.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Kind-specific data.
    #[serde(default)]
    pub data: Value,

    /// Fields this core does not interpret (title, timestamps, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notification {
    /// Kind of notification raised for an incoming chat message.
    pub const NEW_MESSAGE: &'static str = "NEW_MESSAGE";

    /// Returns `true` for a new-message notification.
    #[inline]
    #[must_use]
    pub fn is_new_message(&self) -> bool {
        self.kind == Self::NEW_MESSAGE
    }

    /// Returns `data.conversationId`, if present.
    ///
    /// Numeric ids are rendered to their decimal string.
    #[must_use]
    pub fn conversation_id(&self) -> Option<ConversationId> {
        match self.data.get("conversationId")? {
            Value::String(id) => Some(ConversationId::new(id.as_str())),
            Value::Number(id) => Some(ConversationId::new(id.to_string())),
            _ => None,
        }
    }
}

// ============================================================================
// Alert
// ============================================================================

/// Category of a user-visible warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// The server rejected an outgoing message.
    MessageNotSent,
    /// Any other server-reported error.
    ServerError,
}

/// A user-visible warning raised from an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Category.
    pub kind: AlertKind,
    /// Server error code, if one was sent.
    pub code: Option<i64>,
    /// Text to show.
    pub message: String,
}

// ============================================================================
// UiEvent
// ============================================================================

/// Side effects surfaced to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Show a warning toast.
    Alert(Alert),
    /// Show a notification.
    Notification(Notification),
}

// ============================================================================
// Tests
// ============================================================================
