//! Session-level state.
//!
//! These stores outlive individual connections: they persist across
//! reconnects and are only cleared on sign-out.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `registry` | Frame-type subscriptions |
//! | `conversations` | Per-conversation message lists |
//! | `presence` | Online counterpart users |
//! | `focus` | Focused conversation |

// ============================================================================
// Submodules
// ============================================================================

/// Per-conversation message lists.
pub mod conversations;

/// Focused conversation.
pub mod focus;

/// Online counterpart users.
pub mod presence;

/// Frame-type subscriptions.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use conversations::ConversationStore;
pub use focus::FocusTracker;
pub use presence::PresenceTracker;
pub use registry::{Handler, HandlerRegistry};
