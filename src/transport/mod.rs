//! WebSocket transport layer.
//!
//! This module owns the single physical connection to the streaming
//! endpoint and decides when to open, close, and reopen it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                         ┌─────────────────┐
//! │  ConnectionManager   │                         │  Server         │
//! │                      │        WebSocket        │                 │
//! │  Connector           │◄───────────────────────►│  /ws endpoint   │
//! │  → TransportHandle   │                         │                 │
//! │  ← TransportSink     │                         │                 │
//! └──────────────────────┘                         └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionManager::open` - Start an attempt through the `Connector`
//! 2. Transport reports `Opened`; state stays `connecting`
//! 3. `authentication_success` frame - State becomes `connected`
//! 4. Close or error - Backoff timer scheduled while authenticated
//! 5. `ConnectionManager::disconnect` - Cancel timer, close transport
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnect delay policy |
//! | `connection` | Transport seam and WebSocket event loop |
//! | `manager` | Connection state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect delay policy.
pub mod backoff;

/// Transport seam and WebSocket event loop.
pub mod connection;

/// Connection state machine.
pub mod manager;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::ReconnectConfig;
pub use connection::{
    Connector, EventReceiver, EventSender, Outbound, OutboundReceiver, TransportEvent,
    DEFAULT_HANDSHAKE_TIMEOUT, TransportEventKind, TransportHandle, TransportSink, WsConnector,
};
pub use manager::{ConnectionManager, ConnectionState};

// ============================================================================
// Test Support
// ============================================================================
