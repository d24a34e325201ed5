//! Builder pattern for facade configuration.
//!
//! Provides a fluent API for configuring and creating [`Realtime`] instances.
//!
//! # Example
//!
//! ```no_run
//! use portal_realtime::{Realtime, ReconnectConfig};
//!
//! # async fn example() -> portal_realtime::Result<()> {
//! let realtime = Realtime::builder()
//!     .base_url("https://api.example.com")
//!     .reconnect(ReconnectConfig::default().with_max_attempts(50))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Connector, ReconnectConfig, WsConnector};

use super::core::Realtime;
use super::options::{DEFAULT_EVENT_CAPACITY, DEFAULT_PATH, RealtimeOptions};

// ============================================================================
// RealtimeBuilder
// ============================================================================

/// Builder for configuring a [`Realtime`] instance.
///
/// Use [`Realtime::builder()`] to create a new builder.
#[derive(Clone)]
pub struct RealtimeBuilder {
    /// Backend base address.
    base_url: Option<String>,
    /// Streaming endpoint path.
    path: String,
    /// Reconnect policy.
    reconnect: ReconnectConfig,
    /// UI event channel capacity.
    event_capacity: usize,
    /// Transport factory override.
    connector: Option<Arc<dyn Connector>>,
}

impl Default for RealtimeBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            path: DEFAULT_PATH.to_string(),
            reconnect: ReconnectConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            connector: None,
        }
    }
}

impl fmt::Debug for RealtimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeBuilder")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("reconnect", &self.reconnect)
            .field("event_capacity", &self.event_capacity)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// RealtimeBuilder Implementation
// ============================================================================

impl RealtimeBuilder {
    /// Creates a builder with default settings and no base address.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend base address.
    ///
    /// # Arguments
    ///
    /// * `url` - e.g. `"https://api.example.com"`; the scheme is swapped to
    ///   `wss` when connecting
    #[inline]
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the streaming endpoint path (default `/ws`).
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the reconnect backoff policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Sets the UI event channel capacity (default 64).
    #[inline]
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Replaces the WebSocket transport.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Validates the configuration without building.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the base address is missing or a value is invalid
    /// - [`Error::InvalidUrl`] if the base address cannot be used
    pub fn options(&self) -> Result<RealtimeOptions> {
        let raw = self.base_url.as_deref().ok_or_else(|| {
            Error::config(
                "Base URL is required. Use .base_url() to set it.\n\
                 Example: Realtime::builder().base_url(\"https://api.example.com\")",
            )
        })?;

        let base_url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e.to_string()))?;

        let options = RealtimeOptions {
            base_url,
            path: self.path.clone(),
            reconnect: self.reconnect.clone(),
            event_capacity: self.event_capacity,
        };
        options.validate()?;

        Ok(options)
    }

    /// Builds the facade and starts its event pump.
    ///
    /// Must be called from inside a tokio runtime. Nothing connects until
    /// authentication is applied.
    ///
    /// # Errors
    ///
    /// - Everything [`options`](Self::options) reports
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn build(self) -> Result<Realtime> {
        let options = self.options()?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector::new()) as Arc<dyn Connector>);

        Realtime::start(options, connector)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::ConnectionState;

    #[test]
    fn test_defaults() {
        let builder = RealtimeBuilder::new();
        assert!(builder.base_url.is_none());
        assert_eq!(builder.path, "/ws");
        assert_eq!(builder.event_capacity, 64);
        assert_eq!(builder.reconnect, ReconnectConfig::default());
    }

    #[test]
    fn test_missing_base_url() {
        let err = RealtimeBuilder::new().options().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_unparseable_base_url() {
        let err = RealtimeBuilder::new()
            .base_url("not a url")
            .options()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_invalid_reconnect_rejected() {
        let err = RealtimeBuilder::new()
            .base_url("http://localhost")
            .reconnect(ReconnectConfig::default().with_multiplier(0.0))
            .options()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_options_carry_settings() {
        let options = RealtimeBuilder::new()
            .base_url("https://api.example.com")
            .path("/realtime")
            .event_capacity(8)
            .reconnect(ReconnectConfig::default().with_max_delay(Duration::from_secs(10)))
            .options()
            .expect("options");

        assert_eq!(options.ws_url().expect("url").as_str(), "wss://api.example.com/realtime");
        assert_eq!(options.event_capacity, 8);
        assert_eq!(options.reconnect.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_build_requires_runtime() {
        let err = RealtimeBuilder::new()
            .base_url("http://localhost")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_build_starts_disconnected() {
        let realtime = RealtimeBuilder::new()
            .base_url("http://localhost:9")
            .build()
            .expect("build");

        assert_eq!(realtime.state(), ConnectionState::Disconnected);
        assert!(realtime.connect().is_err());
    }
}
