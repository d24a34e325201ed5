//! Realtime facade.
//!
//! [`Realtime`] is the one object the application talks to. It owns the
//! connection manager and the session stores, and runs a single event pump
//! that processes transport events one at a time.
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
//! let subscription = realtime.subscribe("new_message", |payload| {
//!     println!("new message: {payload}");
//! });
//!
//! realtime.apply_auth(&AuthState::signed_in(UserIdentity::new("me@example.com")));
//! realtime.join_conversation("42");
//!
//! subscription.unsubscribe();
//! realtime.shutdown();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConversationId, SubscriptionId};
use crate::models::{Message, OnlineUser, UiEvent};
use crate::protocol::{Command, Frame, FrameCodec};
use crate::state::{ConversationStore, FocusTracker, HandlerRegistry, PresenceTracker};
use crate::transport::{
    ConnectionManager, ConnectionState, Connector, EventReceiver, TransportEvent,
    TransportEventKind,
};

use super::auth::{AuthState, UserIdentity};
use super::builder::RealtimeBuilder;
use super::dispatch::{DispatchOutcome, Dispatcher};
use super::options::RealtimeOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the facade.
pub(crate) struct RealtimeInner {
    /// Validated configuration.
    pub options: RealtimeOptions,

    /// Physical connection and reconnect scheduling.
    pub manager: ConnectionManager,

    /// Frame-type subscriptions.
    pub registry: Arc<HandlerRegistry>,

    /// Per-conversation messages.
    pub conversations: ConversationStore,

    /// Online counterpart users.
    pub presence: PresenceTracker,

    /// Focused conversation.
    pub focus: FocusTracker,

    /// Toasts and notifications for the UI.
    pub ui_events: broadcast::Sender<UiEvent>,

    /// Signed-in user.
    pub user: RwLock<Option<UserIdentity>>,

    /// Event pump task.
    pub pump: Mutex<Option<JoinHandle<()>>>,

    /// Authentication follower task.
    pub auth_follower: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for RealtimeInner {
    fn drop(&mut self) {
        if let Some(task) = self.auth_follower.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.pump.get_mut().take() {
            task.abort();
        }
    }
}

// ============================================================================
// Realtime
// ============================================================================

/// Realtime connectivity facade.
///
/// Cheap to clone; all clones share one connection. Dropping the last clone
/// disconnects and stops the event pump.
#[derive(Clone)]
pub struct Realtime {
    /// Shared inner state.
    pub(crate) inner: Arc<RealtimeInner>,
}

// ============================================================================
// Realtime - Display
// ============================================================================

impl fmt::Debug for Realtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realtime")
            .field("url", &self.inner.manager.url().as_str())
            .field("state", &self.state())
            .field("focused", &self.focused_conversation())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Realtime - Construction
// ============================================================================

impl Realtime {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RealtimeBuilder {
        RealtimeBuilder::new()
    }

    /// Assembles the facade and spawns its event pump.
    pub(crate) fn start(options: RealtimeOptions, connector: Arc<dyn Connector>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("Realtime must be built inside a tokio runtime"))?;

        let (realtime, events) = Self::assemble(options, connector)?;

        let weak = Arc::downgrade(&realtime.inner);
        let pump = runtime.spawn(run_pump(weak, events));
        *realtime.inner.pump.lock() = Some(pump);

        info!(url = %realtime.inner.manager.url(), "Realtime started");
        Ok(realtime)
    }

    /// Assembles the facade without an event pump; the caller drains the
    /// returned queue.
    pub(crate) fn assemble(
        options: RealtimeOptions,
        connector: Arc<dyn Connector>,
    ) -> Result<(Self, EventReceiver)> {
        options.validate()?;
        let url = options.ws_url()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(url, connector, options.reconnect.clone(), events_tx);
        let (ui_events, _) = broadcast::channel(options.event_capacity);

        let inner = RealtimeInner {
            options,
            manager,
            registry: Arc::new(HandlerRegistry::new()),
            conversations: ConversationStore::new(),
            presence: PresenceTracker::new(),
            focus: FocusTracker::new(),
            ui_events,
            user: RwLock::new(None),
            pump: Mutex::new(None),
            auth_follower: Mutex::new(None),
        };

        Ok((
            Self {
                inner: Arc::new(inner),
            },
            events_rx,
        ))
    }
}

// ============================================================================
// Realtime - Authentication
// ============================================================================

impl Realtime {
    /// Reacts to one value of the authentication signal.
    ///
    /// Signed in: record the user and connect (no-op if already connecting
    /// or connected). Signed out: disconnect, clear the focus, and drop the
    /// session caches.
    pub fn apply_auth(&self, auth: &AuthState) {
        let inner = &self.inner;

        if auth.is_authenticated() {
            *inner.user.write() = auth.user.clone();
            inner.manager.set_authenticated(true);
            if let Err(e) = inner.manager.open() {
                warn!(error = %e, "Connect after sign-in failed");
            }
            return;
        }

        let was_authenticated = inner.manager.is_authenticated();
        inner.manager.set_authenticated(false);
        inner.focus.leave();
        inner.presence.clear();
        inner.conversations.clear();
        *inner.user.write() = None;

        if was_authenticated {
            info!("Signed out, session state cleared");
        }
    }

    /// Applies every value published on `auth`, starting with the current
    /// one. Replaces any previous follower.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if called outside a tokio runtime.
    pub fn follow_auth(&self, mut auth: watch::Receiver<AuthState>) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("follow_auth requires a tokio runtime"))?;

        let weak = Arc::downgrade(&self.inner);
        let task = runtime.spawn(async move {
            loop {
                let state = auth.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Realtime { inner }.apply_auth(&state);

                if auth.changed().await.is_err() {
                    debug!("Authentication source dropped");
                    break;
                }
            }
        });

        if let Some(previous) = self.inner.auth_follower.lock().replace(task) {
            previous.abort();
        }

        Ok(())
    }

    /// Returns the signed-in user.
    #[must_use]
    pub fn current_user(&self) -> Option<UserIdentity> {
        self.inner.user.read().clone()
    }

    /// Returns the mirrored authentication signal.
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.manager.is_authenticated()
    }
}

// ============================================================================
// Realtime - Connection
// ============================================================================

impl Realtime {
    /// Opens the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] if the authentication signal is false.
    pub fn connect(&self) -> Result<()> {
        self.inner.manager.open()
    }

    /// Closes the connection and cancels any pending reconnect. Idempotent.
    pub fn disconnect(&self) {
        self.inner.manager.disconnect();
    }

    /// Disconnects and stops the background tasks.
    pub fn shutdown(&self) {
        self.inner.manager.disconnect();

        if let Some(task) = self.inner.auth_follower.lock().take() {
            task.abort();
        }
        if let Some(task) = self.inner.pump.lock().take() {
            task.abort();
        }

        info!("Realtime shut down");
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.manager.state()
    }

    /// Subscribes to connection state changes.
    #[inline]
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.manager.watch_state()
    }

    /// Returns the reconnect attempt counter.
    #[inline]
    #[must_use]
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.manager.attempt()
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &RealtimeOptions {
        &self.inner.options
    }
}

// ============================================================================
// Realtime - Sending
// ============================================================================

impl Realtime {
    /// Sends a frame. Best-effort: dropped with a log line unless connected.
    ///
    /// Returns `true` if the frame was handed to the transport.
    pub fn send(&self, frame_type: impl Into<String>, payload: Value) -> bool {
        let frame = Frame::new(frame_type, payload);
        match FrameCodec::encode(&frame) {
            Ok(text) => self.send_text(frame.frame_type(), text),
            Err(e) => {
                warn!(frame_type = %frame.frame_type, error = %e, "Frame encoding failed");
                false
            }
        }
    }

    /// Sends a typed command. Same delivery rules as [`send`](Self::send).
    pub fn send_command(&self, command: &Command) -> bool {
        match FrameCodec::encode(command) {
            Ok(text) => self.send_text(command.frame_type(), text),
            Err(e) => {
                warn!(frame_type = command.frame_type(), error = %e, "Command encoding failed");
                false
            }
        }
    }

    fn send_text(&self, frame_type: &str, text: String) -> bool {
        match self.inner.manager.send_text(text) {
            Ok(()) => {
                debug!(frame_type, "Frame sent");
                true
            }
            Err(e) => {
                warn!(frame_type, error = %e, "Frame dropped");
                false
            }
        }
    }
}

// ============================================================================
// Realtime - Subscriptions
// ============================================================================

impl Realtime {
    /// Registers `callback` for every inbound frame of `frame_type`.
    ///
    /// Subscribers run before built-in processing, in registration order.
    pub fn subscribe<F>(&self, frame_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let frame_type = frame_type.into();
        let id = self
            .inner
            .registry
            .register(frame_type.clone(), Arc::new(callback));

        debug!(%frame_type, %id, "Subscribed");

        Subscription {
            frame_type,
            id,
            registry: Arc::downgrade(&self.inner.registry),
        }
    }

    /// Returns the number of subscriptions for `frame_type`.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self, frame_type: &str) -> usize {
        self.inner.registry.count(frame_type)
    }
}

// ============================================================================
// Realtime - Conversations
// ============================================================================

impl Realtime {
    /// Focuses `conversation_id` and asks the server to join it.
    ///
    /// The focus is recorded even when offline; the join is re-sent once the
    /// next connection authenticates.
    pub fn join_conversation(&self, conversation_id: impl Into<ConversationId>) {
        let conversation_id = conversation_id.into();
        self.inner.focus.join(conversation_id.clone());

        info!(conversation = %conversation_id, "Joining conversation");
        self.send_command(&Command::JoinConversation { conversation_id });
    }

    /// Clears the focus.
    pub fn leave_conversation(&self) {
        if let Some(previous) = self.inner.focus.leave() {
            info!(conversation = %previous, "Left conversation");
        }
    }

    /// Returns the focused conversation.
    #[inline]
    #[must_use]
    pub fn focused_conversation(&self) -> Option<ConversationId> {
        self.inner.focus.focused()
    }

    /// Subscribes to focus changes.
    #[inline]
    #[must_use]
    pub fn watch_focus(&self) -> watch::Receiver<Option<ConversationId>> {
        self.inner.focus.watch()
    }

    /// Replaces a conversation's messages.
    pub fn hydrate_conversation(
        &self,
        conversation_id: impl Into<ConversationId>,
        messages: Vec<Message>,
    ) {
        self.inner
            .conversations
            .hydrate(conversation_id.into(), messages);
    }

    /// Appends a message unless its id is already stored.
    ///
    /// Returns `true` if it was added.
    pub fn append_message(&self, conversation_id: impl Into<ConversationId>, message: Message) -> bool {
        self.inner
            .conversations
            .append(conversation_id.into(), message)
    }

    /// Returns a copy of one conversation's messages.
    #[must_use]
    pub fn messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.inner.conversations.messages(conversation_id)
    }

    /// Returns a copy of every conversation.
    #[must_use]
    pub fn conversations(&self) -> FxHashMap<ConversationId, Vec<Message>> {
        self.inner.conversations.snapshot()
    }
}

// ============================================================================
// Realtime - Presence & UI Events
// ============================================================================

impl Realtime {
    /// Returns the online users.
    #[must_use]
    pub fn online_users(&self) -> Vec<OnlineUser> {
        self.inner.presence.snapshot()
    }

    /// Returns `true` if `user_email` is online.
    #[inline]
    #[must_use]
    pub fn is_online(&self, user_email: &str) -> bool {
        self.inner.presence.is_online(user_email)
    }

    /// Subscribes to alerts and notifications.
    #[inline]
    #[must_use]
    pub fn ui_events(&self) -> broadcast::Receiver<UiEvent> {
        self.inner.ui_events.subscribe()
    }
}

// ============================================================================
// Event Processing
// ============================================================================

impl RealtimeInner {
    /// Processes one transport event.
    pub(crate) fn handle_event(&self, event: TransportEvent) {
        let TransportEvent { epoch, kind } = event;

        match kind {
            TransportEventKind::Opened => self.manager.on_opened(epoch),

            TransportEventKind::Frame(text) => {
                if !self.manager.is_current(epoch) {
                    trace!(epoch, "Dropping frame from stale connection");
                    return;
                }

                let outcome = self.dispatcher().dispatch(&text);
                if outcome == DispatchOutcome::Authenticated && self.manager.on_authenticated(epoch)
                {
                    self.rejoin_focused();
                }
            }

            TransportEventKind::Closed { reason } => {
                self.manager.on_closed(epoch, reason.as_deref());
            }

            TransportEventKind::Failed { reason } => self.manager.on_failed(epoch, &reason),

            TransportEventKind::BackoffElapsed => self.manager.on_backoff_elapsed(epoch),
        }
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher {
            registry: &self.registry,
            conversations: &self.conversations,
            presence: &self.presence,
            focus: &self.focus,
            ui_events: &self.ui_events,
        }
    }

    /// Re-sends the join for the focused conversation on a fresh connection.
    fn rejoin_focused(&self) {
        let Some(conversation_id) = self.focus.focused() else {
            return;
        };

        let command = Command::JoinConversation {
            conversation_id: conversation_id.clone(),
        };
        let sent = FrameCodec::encode(&command).and_then(|text| self.manager.send_text(text));

        match sent {
            Ok(()) => debug!(conversation = %conversation_id, "Re-joined focused conversation"),
            Err(e) => warn!(conversation = %conversation_id, error = %e, "Re-join failed"),
        }
    }
}

/// Event pump: processes transport events until the facade is gone.
async fn run_pump(inner: Weak<RealtimeInner>, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_event(event);
    }

    debug!("Event pump terminated");
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle to one registered subscriber.
///
/// Dropping it leaves the callback registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    frame_type: String,
    id: SubscriptionId,
    registry: Weak<HandlerRegistry>,
}

impl Subscription {
    /// Returns the subscribed frame type.
    #[inline]
    #[must_use]
    pub fn frame_type(&self) -> &str {
        &self.frame_type
    }

    /// Returns the subscription id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes exactly this subscriber. Returns `false` if the facade is gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };

        let removed = registry.unregister(&self.frame_type, self.id);
        if removed {
            debug!(frame_type = %self.frame_type, id = %self.id, "Unsubscribed");
        }
        removed
    }
}

// ============================================================================
// Tests
// ============================================================================
