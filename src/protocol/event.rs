//! Inbound event types.
//!
//! Events are frames pushed from the server. A decoded [`Frame`] is parsed
//! into an [`InboundEvent`] for the built-in processing step.
//!
//! # Event Types
//!
//! | Type | Event |
//! |------|-------|
//! | `connection_established` | [`InboundEvent::ConnectionEstablished`] |
//! | `authentication_success` | [`InboundEvent::AuthenticationSuccess`] |
//! | `online_users_list` | [`InboundEvent::OnlineUsersList`] |
//! | `user_online` | [`InboundEvent::UserOnline`] |
//! | `user_offline` | [`InboundEvent::UserOffline`] |
//! | `messages_loaded` | [`InboundEvent::MessagesLoaded`] |
//! | `new_message` | [`InboundEvent::NewMessage`] |
//! | `message_sent` | [`InboundEvent::MessageSent`] |
//! | `error` | [`InboundEvent::ServerError`] |
//! | `notification` | [`InboundEvent::Notification`] |
//! | `notifications_count` | [`InboundEvent::NotificationsCount`] |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::ConversationId;
use crate::models::{Message, Notification, OnlineUser};

use super::Frame;

// ============================================================================
// Frame Type Names
// ============================================================================

/// Inbound frame type names with built-in handling.
pub mod frame_types {
    /// Socket accepted by the server; informational.
    pub const CONNECTION_ESTABLISHED: &str = "connection_established";
    /// Server-side authentication confirmed.
    pub const AUTHENTICATION_SUCCESS: &str = "authentication_success";
    /// Full roster of online users.
    pub const ONLINE_USERS_LIST: &str = "online_users_list";
    /// One user came online.
    pub const USER_ONLINE: &str = "user_online";
    /// One user went offline.
    pub const USER_OFFLINE: &str = "user_offline";
    /// Full history of one conversation.
    pub const MESSAGES_LOADED: &str = "messages_loaded";
    /// Message from a counterpart.
    pub const NEW_MESSAGE: &str = "new_message";
    /// Echo of a message this user sent.
    pub const MESSAGE_SENT: &str = "message_sent";
    /// Application-level error.
    pub const ERROR: &str = "error";
    /// Notification for the notification center.
    pub const NOTIFICATION: &str = "notification";
    /// Unread notification counter; informational.
    pub const NOTIFICATIONS_COUNT: &str = "notifications_count";
}

// ============================================================================
// Payload Shapes
// ============================================================================

#[derive(Deserialize)]
struct UsersPayload {
    #[serde(default)]
    users: Vec<OnlineUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserOfflinePayload {
    user_email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesLoadedPayload {
    conversation_id: ConversationId,
    #[serde(default)]
    messages: Vec<Message>,
}

/// Integral error code; `4010.0` counts, `"AUTH_FAILED"` does not.
fn error_code(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|code| code.fract() == 0.0 && code.abs() < i64::MAX as f64)
            .map(|code| code as i64)
    })
}

// ============================================================================
// InboundEvent
// ============================================================================

/// Parsed inbound frames for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Socket accepted; informational only.
    ConnectionEstablished,

    /// Server confirmed authentication; the connection is ready.
    AuthenticationSuccess,

    /// Replace the online roster.
    OnlineUsersList {
        /// Everyone currently online.
        users: Vec<OnlineUser>,
    },

    /// Add one online user.
    UserOnline(OnlineUser),

    /// Remove one online user.
    UserOffline {
        /// Email of the user who left.
        user_email: String,
    },

    /// Replace a conversation's history.
    MessagesLoaded {
        /// Conversation being hydrated.
        conversation_id: ConversationId,
        /// Complete history, oldest first.
        messages: Vec<Message>,
    },

    /// Message from a counterpart.
    NewMessage(Message),

    /// Server echo of our own message.
    MessageSent(Message),

    /// Application-level error.
    ServerError {
        /// Error code.
        code: Option<i64>,
        /// Human-readable text.
        message: Option<String>,
    },

    /// Notification for the notification center.
    Notification(Notification),

    /// Unread notification count.
    NotificationsCount {
        /// Unread count, if present.
        count: Option<u64>,
    },

    /// Type without built-in handling.
    Unknown {
        /// Frame type.
        frame_type: String,
        /// Frame payload.
        payload: Value,
    },
}

impl InboundEvent {
    /// Parses a frame into a typed event.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPayload`] if a recognised type carries a payload of
    /// the wrong shape.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        use frame_types::*;

        let event = match frame.frame_type.as_str() {
            CONNECTION_ESTABLISHED => Self::ConnectionEstablished,

            AUTHENTICATION_SUCCESS => Self::AuthenticationSuccess,

            ONLINE_USERS_LIST => Self::OnlineUsersList {
                users: payload_as::<UsersPayload>(frame)?.users,
            },

            USER_ONLINE => Self::UserOnline(payload_as(frame)?),

            USER_OFFLINE => Self::UserOffline {
                user_email: payload_as::<UserOfflinePayload>(frame)?.user_email,
            },

            MESSAGES_LOADED => {
                let payload: MessagesLoadedPayload = payload_as(frame)?;
                Self::MessagesLoaded {
                    conversation_id: payload.conversation_id,
                    messages: payload.messages,
                }
            }

            NEW_MESSAGE => Self::NewMessage(payload_as(frame)?),

            MESSAGE_SENT => Self::MessageSent(payload_as(frame)?),

            ERROR => Self::ServerError {
                code: frame.payload.get("code").and_then(error_code),
                message: frame
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },

            NOTIFICATION => Self::Notification(payload_as(frame)?),

            NOTIFICATIONS_COUNT => Self::NotificationsCount {
                count: frame.payload.get("count").and_then(Value::as_u64),
            },

            _ => Self::Unknown {
                frame_type: frame.frame_type.clone(),
                payload: frame.payload.clone(),
            },
        };

        Ok(event)
    }

    /// Returns `true` for types without built-in handling.
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

/// Deserializes the frame payload into `T`.
fn payload_as<T: DeserializeOwned>(frame: &Frame) -> Result<T> {
    T::deserialize(&frame.payload)
        .map_err(|e| Error::invalid_payload(&frame.frame_type, e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
