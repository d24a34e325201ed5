//! Connection lifecycle and reconnect scheduling.
//!
//! [`ConnectionManager`] owns the single physical connection. It keeps
//! exactly one attempt alive while the authentication signal is true and
//! none while it is false.
//!
//! # State Graph
//!
//! ```text
//!                 open                 authentication_success
//! Disconnected ──────────► Connecting ─────────────────────────► Connected
//!      ▲                    │   ▲  │                                 │
//!      │   disconnect       │   │  │ construction failure /          │ close
//!      ├────────────────────┤   │  │ transport error                 │ (still authenticated)
//!      │                    │   │  ▼                                 ▼
//!      │                    │  Error ◄──── transport error ──── Reconnecting
//!      │                    │   │ backoff elapsed                    │
//!      │                    │   └──────────► Connecting ◄────────────┘
//!      │                    │                                backoff elapsed
//!      └──── disconnect ────┴──── from any state
//! ```
//!
//! Every attempt gets a fresh epoch. Transport events and backoff timers
//! carry the epoch they were created under; anything from an older epoch is
//! ignored, so an explicit disconnect can never be undone by a late event.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{Error, Result};

use super::backoff::ReconnectConfig;
use super::connection::{Connector, EventSender, TransportHandle, TransportSink};

// ============================================================================
// ConnectionState
// ============================================================================

/// Externally observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and none scheduled.
    #[default]
    Disconnected,
    /// Transport being established or awaiting server authentication.
    Connecting,
    /// Server confirmed authentication.
    Connected,
    /// Dropped while authenticated; a reconnect is scheduled.
    Reconnecting,
    /// Transport failed; a reconnect is scheduled unless attempts ran out.
    Error,
}

impl ConnectionState {
    /// Returns `true` if frames can be sent.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` while an attempt is in flight or scheduled.
    #[inline]
    #[must_use]
    pub const fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    /// Returns `true` if `next` is reachable from `self` in one step.
    ///
    /// Staying in the same state is always allowed.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        if *self as u8 == next as u8 {
            return true;
        }

        matches!(
            (*self, next),
            (Self::Disconnected, Self::Connecting)
                | (
                    Self::Connecting,
                    Self::Connected | Self::Reconnecting | Self::Error | Self::Disconnected
                )
                | (
                    Self::Connected,
                    Self::Reconnecting | Self::Error | Self::Disconnected
                )
                | (Self::Reconnecting, Self::Connecting | Self::Disconnected)
                | (Self::Error, Self::Connecting | Self::Disconnected)
        )
    }

    /// Returns the lowercase label.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ManagerInner
// ============================================================================

/// Mutable lifecycle state, guarded by one lock.
#[derive(Default)]
struct ManagerInner {
    /// Mirror of the external authentication signal.
    authenticated: bool,
    /// Whether the caller wants a connection kept alive.
    wanted: bool,
    /// Current attempt epoch.
    epoch: u64,
    /// Live transport, present while connecting or connected.
    transport: Option<TransportHandle>,
    /// Transport reported open (handshake done, authentication pending).
    transport_open: bool,
    /// Reconnect attempts since the last confirmed authentication.
    attempt: u32,
    /// Pending backoff timer.
    backoff: Option<JoinHandle<()>>,
}

impl ManagerInner {
    fn should_reconnect(&self) -> bool {
        self.authenticated && self.wanted
    }

    fn cancel_backoff(&mut self) -> bool {
        match self.backoff.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owns the physical connection, its state, and the reconnect timer.
///
/// # Thread Safety
///
/// All methods take `&self` and return immediately. Transport events must
/// be fed back in order through the `on_*` methods by a single consumer.
pub struct ConnectionManager {
    /// Streaming endpoint.
    url: Url,
    /// Transport factory.
    connector: Arc<dyn Connector>,
    /// Backoff policy.
    config: ReconnectConfig,
    /// Queue that transports and timers report into.
    events: EventSender,
    /// Observable state.
    state: watch::Sender<ConnectionState>,
    /// Lifecycle state.
    inner: Mutex<ManagerInner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url.as_str())
            .field("state", &self.state())
            .field("attempt", &self.attempt())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructor
// ============================================================================

impl ConnectionManager {
    /// Creates a manager in the `disconnected` state.
    #[must_use]
    pub fn new(
        url: Url,
        connector: Arc<dyn Connector>,
        config: ReconnectConfig,
        events: EventSender,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            url,
            connector,
            config,
            events,
            state,
            inner: Mutex::new(ManagerInner::default()),
        }
    }
}

// ============================================================================
// ConnectionManager - Accessors
// ============================================================================

impl ConnectionManager {
    /// Returns the streaming endpoint.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    #[inline]
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Returns the reconnect attempt counter.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.inner.lock().attempt
    }

    /// Returns the current attempt epoch.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Returns `true` if `epoch` belongs to the current attempt.
    #[inline]
    #[must_use]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.inner.lock().epoch == epoch
    }

    /// Returns the mirrored authentication signal.
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().authenticated
    }

    /// Returns `true` if a backoff timer is pending.
    #[inline]
    #[must_use]
    pub fn has_pending_backoff(&self) -> bool {
        self.inner.lock().backoff.is_some()
    }

    /// Returns `true` if a transport exists and reported open.
    #[inline]
    #[must_use]
    pub fn is_transport_open(&self) -> bool {
        let inner = self.inner.lock();
        inner.transport.is_some() && inner.transport_open
    }
}

// ============================================================================
// ConnectionManager - Commands
// ============================================================================

impl ConnectionManager {
    /// Updates the mirrored authentication signal.
    ///
    /// Turning it off disconnects. Turning it on does not connect by itself;
    /// call [`open`](Self::open).
    pub fn set_authenticated(&self, authenticated: bool) {
        self.inner.lock().authenticated = authenticated;
        if !authenticated {
            self.disconnect();
        }
    }

    /// Starts a connection attempt.
    ///
    /// No-op while a transport is already open or mid-handshake. A pending
    /// backoff timer is superseded by the immediate attempt, and an exhausted
    /// retry budget starts over.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] if the authentication signal is false.
    pub fn open(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        if !inner.authenticated {
            warn!("Connect refused: not authenticated");
            return Err(Error::NotAuthenticated);
        }

        inner.wanted = true;

        if inner.transport.is_some() {
            debug!(epoch = inner.epoch, "Connect ignored: transport already active");
            return Ok(());
        }

        inner.cancel_backoff();
        if self.config.is_exhausted(inner.attempt) {
            debug!(attempts = inner.attempt, "Retry budget reset by explicit connect");
            inner.attempt = 0;
        }
        self.open_locked(&mut inner);
        Ok(())
    }

    /// Tears the connection down and cancels any pending reconnect.
    ///
    /// The timer is cancelled and the transport closed before the state
    /// flips, so nothing can reopen a connection the caller believes closed.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();

        inner.wanted = false;
        let cancelled = inner.cancel_backoff();
        inner.epoch += 1;

        let had_transport = match inner.transport.take() {
            Some(transport) => {
                transport.close();
                true
            }
            None => false,
        };

        inner.transport_open = false;
        inner.attempt = 0;
        self.transition(ConnectionState::Disconnected);

        info!(cancelled_backoff = cancelled, had_transport, "Disconnected");
    }

    /// Queues a text frame on the live transport.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the state is `connected`
    /// - [`Error::ConnectionClosed`] if the socket task already ended
    pub fn send_text(&self, text: String) -> Result<()> {
        let inner = self.inner.lock();
        let state = self.state();

        if !state.is_connected() || !inner.transport_open {
            return Err(Error::not_connected(state));
        }

        inner
            .transport
            .as_ref()
            .ok_or(Error::ConnectionClosed)?
            .send_text(text)
    }
}

// ============================================================================
// ConnectionManager - Transport Events
// ============================================================================

impl ConnectionManager {
    /// Handles the socket-open event. Does not change the state: the
    /// connection is only ready once the server confirms authentication.
    pub fn on_opened(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.transport.is_none() {
            debug!(epoch, "Ignoring open from stale attempt");
            return;
        }

        inner.transport_open = true;
        debug!(epoch, "Transport open, awaiting authentication");
    }

    /// Handles server-side authentication confirmation.
    ///
    /// Returns `true` if it applied to the current attempt.
    pub fn on_authenticated(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.transport.is_none() {
            debug!(epoch, "Ignoring authentication from stale attempt");
            return false;
        }

        inner.transport_open = true;
        let previous_attempts = inner.attempt;
        inner.attempt = 0;
        self.transition(ConnectionState::Connected);

        info!(epoch, previous_attempts, "Connection authenticated");
        true
    }

    /// Handles a transport close.
    pub fn on_closed(&self, epoch: u64, reason: Option<&str>) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.transport.take().is_none() {
            debug!(epoch, "Ignoring close from stale attempt");
            return;
        }

        inner.transport_open = false;
        info!(epoch, reason = reason.unwrap_or(""), "Transport closed");

        if inner.should_reconnect() {
            self.schedule_reconnect(&mut inner, ConnectionState::Reconnecting);
        } else {
            self.transition(ConnectionState::Disconnected);
        }
    }

    /// Handles a transport error.
    ///
    /// The transport is discarded here; a later close from the same attempt
    /// is then ignored, so each drop schedules at most one reconnect.
    pub fn on_failed(&self, epoch: u64, reason: &str) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            debug!(epoch, "Ignoring failure from stale attempt");
            return;
        }
        let Some(transport) = inner.transport.take() else {
            debug!(epoch, "Ignoring failure for discarded transport");
            return;
        };

        transport.close();
        inner.transport_open = false;
        error!(epoch, reason, "Transport failed");
        self.transition(ConnectionState::Error);

        if inner.should_reconnect() {
            self.schedule_reconnect(&mut inner, ConnectionState::Error);
        }
    }

    /// Handles the backoff timer firing.
    pub fn on_backoff_elapsed(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            debug!(epoch, "Ignoring stale backoff timer");
            return;
        }

        inner.backoff = None;

        if !inner.should_reconnect() || inner.transport.is_some() {
            debug!(epoch, "Backoff elapsed but reconnect no longer wanted");
            return;
        }

        info!(attempt = inner.attempt, "Reconnecting");
        self.open_locked(&mut inner);
    }
}

// ============================================================================
// ConnectionManager - Internals
// ============================================================================

impl ConnectionManager {
    /// Starts a new attempt. Caller holds the lock and has checked that no
    /// transport exists.
    fn open_locked(&self, inner: &mut ManagerInner) {
        inner.epoch += 1;
        inner.transport_open = false;
        self.transition(ConnectionState::Connecting);

        let sink = TransportSink::new(inner.epoch, self.events.clone());
        match self.connector.connect(&self.url, sink) {
            Ok(transport) => {
                debug!(epoch = inner.epoch, url = %self.url, "Connection attempt started");
                inner.transport = Some(transport);
            }
            Err(e) => {
                error!(epoch = inner.epoch, error = %e, "Transport construction failed");
                self.transition(ConnectionState::Error);
                self.schedule_reconnect(inner, ConnectionState::Error);
            }
        }
    }

    /// Schedules one reconnect attempt and labels the wait with `label`.
    fn schedule_reconnect(&self, inner: &mut ManagerInner, label: ConnectionState) {
        inner.cancel_backoff();

        if self.config.is_exhausted(inner.attempt) {
            warn!(
                attempts = inner.attempt,
                max = ?self.config.max_attempts,
                "Reconnect attempts exhausted"
            );
            self.transition(ConnectionState::Error);
            return;
        }

        let delay = self.config.delay_for_attempt(inner.attempt);
        inner.attempt += 1;
        self.transition(label);

        let Ok(runtime) = Handle::try_current() else {
            error!("No async runtime, cannot schedule reconnect");
            return;
        };

        let sink = TransportSink::new(inner.epoch, self.events.clone());
        inner.backoff = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            sink.backoff_elapsed();
        }));

        info!(
            attempt = inner.attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
    }

    /// Moves to `next` if the state graph allows it.
    fn transition(&self, next: ConnectionState) {
        let current = self.state();
        if current == next {
            return;
        }

        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Refusing invalid state transition");
            return;
        }

        debug!(from = %current, to = %next, "State transition");
        self.state.send_replace(next);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.cancel_backoff();
        if let Some(transport) = inner.transport.take() {
            transport.close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
