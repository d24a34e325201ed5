//! Portal Realtime - Persistent connectivity core for the candidate portal.
//!
//! This library keeps one authenticated WebSocket connection alive, turns
//! inbound frames into session state, and lets unrelated features observe
//! specific frame types without touching the connection lifecycle.
//!
//! # Architecture
//!
//! The crate is driven by an external authentication signal:
//!
//! - **Signed in**: open the connection, reconnect with jittered backoff on
//!   every drop
//! - **Signed out**: cancel any pending reconnect, close the socket, clear
//!   session caches
//!
//! Key design principles:
//!
//! - The connection is `connected` only after the server confirms
//!   authentication, never on the raw handshake
//! - Subscribers always run before built-in processing of the same frame
//! - Every connection attempt carries an epoch; late events from an
//!   abandoned attempt are ignored
//! - One event pump processes frames one at a time
//!
//! # Quick Start
//!
//! ```no_run
//! use portal_realtime::{AuthState, Realtime, Result, UserIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let realtime = Realtime::builder()
//!         .base_url("https://api.example.com")
//!         .build()?;
//!
//!     let _messages = realtime.subscribe("new_message", |payload| {
//!         println!("incoming: {payload}");
//!     });
//!
//!     realtime.apply_auth(&AuthState::signed_in(UserIdentity::new("me@example.com")));
//!     realtime.join_conversation("42");
//!
//!     let mut state = realtime.watch_state();
//!     state.wait_for(|s| s.is_connected()).await.ok();
//!     println!("online: {:?}", realtime.online_users());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`realtime`] | Facade: [`Realtime`], [`RealtimeBuilder`], [`Subscription`] |
//! | [`state`] | Session stores: conversations, presence, focus, subscriptions |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`models`] | Payload values: [`Message`], [`OnlineUser`], [`Notification`] |
//! | [`protocol`] | Wire frames, inbound events, outbound commands |
//! | [`transport`] | WebSocket transport and connection state machine |
//!
//! # Features
//!
//! - `native-tls`: `wss://` endpoints through the platform TLS stack

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Payload values carried by frames.
pub mod models;

/// WebSocket protocol message types.
///
/// Frame envelope, typed inbound events and outbound commands.
pub mod protocol;

/// Realtime facade.
///
/// Use [`Realtime::builder()`] to create a configured instance.
pub mod realtime;

/// Session-level state.
///
/// Stores that persist across reconnects.
pub mod state;

/// WebSocket transport layer.
///
/// Connection state machine, reconnect backoff and the socket event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Facade types
pub use realtime::{AuthState, Realtime, RealtimeBuilder, RealtimeOptions, Subscription, UserIdentity};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConversationId, MessageId, SubscriptionId};

// Model types
pub use models::{Alert, AlertKind, Message, Notification, OnlineUser, UiEvent};

// Protocol types
pub use protocol::{Command, Frame, FrameCodec, InboundEvent};

// State types
pub use state::{ConversationStore, FocusTracker, HandlerRegistry, PresenceTracker};

// Transport types
pub use transport::{ConnectionState, Connector, ReconnectConfig, WsConnector};
