//! Wire protocol.
//!
//! This module defines the frame format shared by both directions and the
//! typed views on top of it.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Frame`] | both | `{ "type", "payload" }` envelope |
//! | [`InboundEvent`] | Server → Client | Typed view of an inbound frame |
//! | [`Command`] | Client → Server | Typed outbound command |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame envelope and codec |
//! | `event` | Inbound event parsing |
//! | `command` | Outbound commands |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command definitions.
pub mod command;

/// Inbound event types.
pub mod event;

/// Frame envelope and codec.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use event::{InboundEvent, frame_types};
pub use frame::{Frame, FrameCodec};
