//! Realtime facade module.
//!
//! This module provides the entry point the application talks to.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Realtime`] | Connection, subscriptions, and session state |
//! | [`RealtimeBuilder`] | Fluent configuration builder |
//! | [`RealtimeOptions`] | Validated configuration |
//! | [`Subscription`] | Handle to one registered subscriber |
//! | [`AuthState`] | Authentication signal input |
//!
//! # Example
//!
//! ```no_run
//! use portal_realtime::{AuthState, Realtime, UserIdentity};
//!
//! # async fn example() -> portal_realtime::Result<()> {
//! let realtime = Realtime::builder()
//!     .base_url("https://api.example.com")
//!     .build()?;
//!
//! realtime.apply_auth(&AuthState::signed_in(UserIdentity::new("me@example.com")));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Authentication collaborator input.
pub mod auth;

/// Fluent builder pattern for facade configuration.
pub mod builder;

/// Core facade implementation.
pub mod core;

/// Inbound frame dispatch.
pub(crate) mod dispatch;

/// Facade configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use auth::{AuthState, UserIdentity};
pub use builder::RealtimeBuilder;
pub use core::{Realtime, Subscription};
pub use options::RealtimeOptions;
