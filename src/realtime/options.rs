//! Facade configuration.
//!
//! # Example
//!
//! ```ignore
//! use portal_realtime::RealtimeOptions;
//! use url::Url;
//!
//! let options = RealtimeOptions::new(Url::parse("https://api.example.com/v1/")?);
//! assert_eq!(options.ws_url()?.as_str(), "wss://api.example.com/v1/ws");
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};
use crate::transport::ReconnectConfig;

// ============================================================================
// Constants
// ============================================================================

/// Streaming endpoint path appended to the base address.
pub const DEFAULT_PATH: &str = "/ws";

/// Capacity of the UI event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

// ============================================================================
// RealtimeOptions
// ============================================================================

/// Validated facade configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeOptions {
    /// Backend base address (`http`, `https`, `ws` or `wss`).
    pub base_url: Url,

    /// Streaming endpoint path, joined onto `base_url`.
    pub path: String,

    /// Reconnect backoff policy.
    pub reconnect: ReconnectConfig,

    /// Capacity of the UI event channel. Slow receivers skip the oldest
    /// events once it is full.
    pub event_capacity: usize,
}

impl RealtimeOptions {
    /// Creates options with defaults for everything but the base address.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            path: DEFAULT_PATH.to_string(),
            reconnect: ReconnectConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Derives the streaming endpoint: the base address with its scheme
    /// swapped to the WebSocket equivalent and `path` appended.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] if the base scheme has no WebSocket equivalent.
    pub fn ws_url(&self) -> Result<Url> {
        let scheme = match self.base_url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::invalid_url(
                    self.base_url.as_str(),
                    format!("unsupported scheme '{other}', expected http(s) or ws(s)"),
                ));
            }
        };

        let mut url = self.base_url.clone();
        url.set_scheme(scheme).map_err(|()| {
            Error::invalid_url(self.base_url.as_str(), "cannot switch to a WebSocket scheme")
        })?;

        let base = url.path().trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let joined = format!("{base}/{path}");
        url.set_path(&joined);

        Ok(url)
    }

    /// Validates every field.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] for an unusable base address
    /// - [`Error::Config`] for an invalid reconnect policy or zero capacity
    pub fn validate(&self) -> Result<()> {
        self.ws_url()?;
        self.reconnect.validate()?;

        if self.event_capacity == 0 {
            return Err(Error::config("event_capacity must be at least 1"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
