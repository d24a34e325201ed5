//! Inbound frame dispatch.
//!
//! Each decoded frame goes through, in this order:
//!
//! 1. Every subscriber registered for its exact type
//! 2. Built-in processing for the recognised types
//! 3. A debug log when neither applies
//!
//! Malformed frames are logged and discarded; nothing here can tear the
//! connection down.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::models::{Alert, AlertKind, Message, Notification, UiEvent};
use crate::protocol::{Frame, FrameCodec, InboundEvent};
use crate::state::{ConversationStore, FocusTracker, HandlerRegistry, PresenceTracker};

// ============================================================================
// Constants
// ============================================================================

/// Server codes meaning an outgoing message was rejected.
const MESSAGE_NOT_SENT_CODES: [i64; 2] = [4010, 4011];

/// Alert text when a rejection carries no message.
const MESSAGE_NOT_SENT_TEXT: &str = "Message not sent";

// ============================================================================
// DispatchOutcome
// ============================================================================

/// What dispatching one frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// Not decodable; discarded.
    Malformed,
    /// `authentication_success`; the caller promotes the connection.
    Authenticated,
    /// Built-in processing ran.
    Processed,
    /// No built-in handling for this type.
    Unhandled,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Borrowed view of the session state a frame can touch.
///
/// Built fresh for every frame, so it always reads the current focus.
pub(crate) struct Dispatcher<'a> {
    pub registry: &'a HandlerRegistry,
    pub conversations: &'a ConversationStore,
    pub presence: &'a PresenceTracker,
    pub focus: &'a FocusTracker,
    pub ui_events: &'a broadcast::Sender<UiEvent>,
}

impl Dispatcher<'_> {
    /// Decodes and dispatches one raw frame.
    pub(crate) fn dispatch(&self, text: &str) -> DispatchOutcome {
        let frame = match FrameCodec::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Discarding malformed frame");
                return DispatchOutcome::Malformed;
            }
        };

        trace!(frame_type = %frame.frame_type, "Frame decoded");

        let subscribers = self.notify_subscribers(&frame);

        let event = match InboundEvent::from_frame(&frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Discarding frame with invalid payload");
                return DispatchOutcome::Malformed;
            }
        };

        if event.is_unknown() {
            if subscribers == 0 {
                debug!(frame_type = %frame.frame_type, "Unhandled frame type");
            }
            return DispatchOutcome::Unhandled;
        }

        self.apply(event)
    }

    /// Runs the subscribers for the frame's type. Returns how many ran.
    fn notify_subscribers(&self, frame: &Frame) -> usize {
        let handlers = self.registry.handlers_for(&frame.frame_type);

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&frame.payload))).is_err() {
                warn!(frame_type = %frame.frame_type, "Subscriber panicked");
            }
        }

        handlers.len()
    }

    /// Built-in processing.
    fn apply(&self, event: InboundEvent) -> DispatchOutcome {
        match event {
            InboundEvent::ConnectionEstablished => {
                debug!("Server acknowledged connection");
            }

            InboundEvent::AuthenticationSuccess => {
                return DispatchOutcome::Authenticated;
            }

            InboundEvent::OnlineUsersList { users } => {
                debug!(count = users.len(), "Online roster received");
                self.presence.set_all(users);
            }

            InboundEvent::UserOnline(user) => {
                debug!(user = %user.user_email, "User online");
                self.presence.add(user);
            }

            InboundEvent::UserOffline { user_email } => {
                debug!(user = %user_email, "User offline");
                self.presence.remove(&user_email);
            }

            InboundEvent::MessagesLoaded {
                conversation_id,
                messages,
            } => {
                debug!(conversation = %conversation_id, count = messages.len(), "History loaded");
                self.conversations.hydrate(conversation_id, messages);
            }

            InboundEvent::NewMessage(message) | InboundEvent::MessageSent(message) => {
                self.append(message);
            }

            InboundEvent::ServerError { code, message } => {
                self.raise_alert(code, message);
            }

            InboundEvent::Notification(notification) => {
                self.forward_notification(notification);
            }

            InboundEvent::NotificationsCount { count } => {
                debug!(?count, "Unread notifications");
            }

            InboundEvent::Unknown { .. } => return DispatchOutcome::Unhandled,
        }

        DispatchOutcome::Processed
    }

    fn append(&self, message: Message) {
        if message.conversation_id.as_str().is_empty() {
            warn!(message = %message.id, "Message without conversation id ignored");
            return;
        }

        let conversation_id = message.conversation_id.clone();
        let message_id = message.id.clone();
        if self.conversations.append(conversation_id, message) {
            debug!(message = %message_id, "Message appended");
        } else {
            trace!(message = %message_id, "Duplicate message ignored");
        }
    }

    fn raise_alert(&self, code: Option<i64>, message: Option<String>) {
        let alert = match (code, message) {
            (Some(code), message) if MESSAGE_NOT_SENT_CODES.contains(&code) => Alert {
                kind: AlertKind::MessageNotSent,
                code: Some(code),
                message: message.unwrap_or_else(|| MESSAGE_NOT_SENT_TEXT.to_string()),
            },
            (code, Some(message)) => Alert {
                kind: AlertKind::ServerError,
                code,
                message,
            },
            (code, None) => {
                debug!(?code, "Error frame without message");
                return;
            }
        };

        warn!(code = ?alert.code, message = %alert.message, "Server error");
        self.emit(UiEvent::Alert(alert));
    }

    fn forward_notification(&self, notification: Notification) {
        if notification.is_new_message()
            && let Some(conversation_id) = notification.conversation_id()
            && self.focus.is_focused(&conversation_id)
        {
            debug!(conversation = %conversation_id, "Notification for focused conversation suppressed");
            return;
        }

        self.emit(UiEvent::Notification(notification));
    }

    fn emit(&self, event: UiEvent) {
        if self.ui_events.send(event).is_err() {
            trace!("No UI event receivers");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{Value, json};

    use super::*;
    use crate::identifiers::ConversationId;

    struct Fixture {
        registry: HandlerRegistry,
        conversations: ConversationStore,
        presence: PresenceTracker,
        focus: FocusTracker,
        ui_events: broadcast::Sender<UiEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let (ui_events, _) = broadcast::channel(16);
            Self {
                registry: HandlerRegistry::new(),
                conversations: ConversationStore::new(),
                presence: PresenceTracker::new(),
                focus: FocusTracker::new(),
                ui_events,
            }
        }

        fn dispatch(&self, frame: Value) -> DispatchOutcome {
            Dispatcher {
                registry: &self.registry,
                conversations: &self.conversations,
                presence: &self.presence,
                focus: &self.focus,
                ui_events: &self.ui_events,
            }
            .dispatch(&frame.to_string())
        }
    }

    fn new_message_notification(conversation: &str) -> Value {
        json!({
            "type": "notification",
            "payload": { "type": "NEW_MESSAGE", "data": { "conversationId": conversation } }
        })
    }

    #[test]
    fn test_malformed_frames_are_discarded() {
        let fx = Fixture::new();
        let outcome = Dispatcher {
            registry: &fx.registry,
            conversations: &fx.conversations,
            presence: &fx.presence,
            focus: &fx.focus,
            ui_events: &fx.ui_events,
        }
        .dispatch("{not json");
        assert_eq!(outcome, DispatchOutcome::Malformed);

        let outcome = fx.dispatch(json!({ "type": "user_online", "payload": 5 }));
        assert_eq!(outcome, DispatchOutcome::Malformed);
    }

    #[test]
    fn test_authentication_success_is_reported() {
        let fx = Fixture::new();
        let outcome = fx.dispatch(json!({ "type": "authentication_success", "payload": {} }));
        assert_eq!(outcome, DispatchOutcome::Authenticated);
    }

    #[test]
    fn test_presence_frames() {
        let fx = Fixture::new();
        fx.dispatch(json!({
            "type": "online_users_list",
            "payload": { "users": [{ "userEmail": "a@x", "userName": "A" }] }
        }));
        fx.dispatch(json!({
            "type": "user_online",
            "payload": { "userEmail": "b@x", "userName": "B" }
        }));
        fx.dispatch(json!({ "type": "user_offline", "payload": { "userEmail": "a@x" } }));

        let emails: Vec<_> = fx
            .presence
            .snapshot()
            .into_iter()
            .map(|u| u.user_email)
            .collect();
        assert_eq!(emails, ["b@x"]);
    }

    #[test]
    fn test_new_message_and_echo_dedup() {
        let fx = Fixture::new();
        let payload = json!({ "id": "m1", "conversationId": "c1", "content": "hi" });

        fx.dispatch(json!({ "type": "new_message", "payload": payload }));
        fx.dispatch(json!({ "type": "message_sent", "payload": payload }));

        assert_eq!(fx.conversations.len(&ConversationId::new("c1")), 1);
    }

    #[test]
    fn test_messages_loaded_hydrates() {
        let fx = Fixture::new();
        fx.dispatch(json!({
            "type": "messages_loaded",
            "payload": {
                "conversationId": 12,
                "messages": [{ "id": 1, "conversationId": 12 }, { "id": 2, "conversationId": 12 }]
            }
        }));
        assert_eq!(fx.conversations.len(&ConversationId::new("12")), 2);
    }

    #[test]
    fn test_subscribers_run_before_builtin_processing() {
        let fx = Fixture::new();
        let seen_before = Arc::new(AtomicUsize::new(usize::MAX));

        let conversations = Arc::new(ConversationStore::new());
        let observed = Arc::clone(&seen_before);
        let store = Arc::clone(&conversations);
        fx.registry.register(
            "new_message",
            Arc::new(move |_: &Value| {
                observed.store(store.len(&ConversationId::new("c1")), Ordering::SeqCst);
            }),
        );

        let outcome = Dispatcher {
            registry: &fx.registry,
            conversations: &conversations,
            presence: &fx.presence,
            focus: &fx.focus,
            ui_events: &fx.ui_events,
        }
        .dispatch(
            &json!({ "type": "new_message", "payload": { "id": "m1", "conversationId": "c1" } })
                .to_string(),
        );

        assert_eq!(outcome, DispatchOutcome::Processed);
        assert_eq!(seen_before.load(Ordering::SeqCst), 0);
        assert_eq!(conversations.len(&ConversationId::new("c1")), 1);
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_dispatch() {
        let fx = Fixture::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        fx.registry
            .register("user_online", Arc::new(|_: &Value| panic!("subscriber bug")));
        fx.registry.register(
            "user_online",
            Arc::new(move |_: &Value| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        fx.dispatch(json!({ "type": "user_online", "payload": { "userEmail": "a@x" } }));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(fx.presence.is_online("a@x"));
    }

    #[test]
    fn test_unknown_type_reaches_subscribers_only() {
        let fx = Fixture::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        fx.registry.register(
            "typing",
            Arc::new(move |payload: &Value| {
                assert_eq!(payload["who"], "a@x");
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let outcome = fx.dispatch(json!({ "type": "typing", "payload": { "who": "a@x" } }));

        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_codes_raise_message_not_sent() {
        let fx = Fixture::new();
        let mut rx = fx.ui_events.subscribe();

        fx.dispatch(json!({ "type": "error", "payload": { "code": 4011 } }));

        match rx.try_recv().expect("alert") {
            UiEvent::Alert(alert) => {
                assert_eq!(alert.kind, AlertKind::MessageNotSent);
                assert_eq!(alert.code, Some(4011));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_generic_error_needs_message() {
        let fx = Fixture::new();
        let mut rx = fx.ui_events.subscribe();

        fx.dispatch(json!({ "type": "error", "payload": { "code": 500 } }));
        assert!(rx.try_recv().is_err());

        fx.dispatch(json!({ "type": "error", "payload": { "code": 500, "message": "boom" } }));
        match rx.try_recv().expect("alert") {
            UiEvent::Alert(alert) => {
                assert_eq!(alert.kind, AlertKind::ServerError);
                assert_eq!(alert.message, "boom");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_error_with_string_code_surfaces_message() {
        let fx = Fixture::new();
        let mut rx = fx.ui_events.subscribe();

        let outcome = fx.dispatch(json!({
            "type": "error",
            "payload": { "code": "AUTH_FAILED", "message": "Session expired" }
        }));

        assert_eq!(outcome, DispatchOutcome::Processed);
        match rx.try_recv().expect("alert") {
            UiEvent::Alert(alert) => {
                assert_eq!(alert.kind, AlertKind::ServerError);
                assert_eq!(alert.code, None);
                assert_eq!(alert.message, "Session expired");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_error_with_float_code_raises_message_not_sent() {
        let fx = Fixture::new();
        let mut rx = fx.ui_events.subscribe();

        let outcome = fx.dispatch(json!({ "type": "error", "payload": { "code": 4010.0 } }));

        assert_eq!(outcome, DispatchOutcome::Processed);
        match rx.try_recv().expect("alert") {
            UiEvent::Alert(alert) => {
                assert_eq!(alert.kind, AlertKind::MessageNotSent);
                assert_eq!(alert.code, Some(4010));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_notification_for_focused_conversation_is_suppressed() {
        let fx = Fixture::new();
        let mut rx = fx.ui_events.subscribe();
        fx.focus.join(ConversationId::new("C1"));

        fx.dispatch(new_message_notification("C1"));
        assert!(rx.try_recv().is_err());

        fx.dispatch(new_message_notification("C2"));
        match rx.try_recv().expect("notification") {
            UiEvent::Notification(notification) => {
                assert_eq!(notification.conversation_id(), Some(ConversationId::new("C2")));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_focus_change_applies_to_next_frame() {
        let fx = Fixture::new();
        let mut rx = fx.ui_events.subscribe();

        fx.focus.join(ConversationId::new("C1"));
        fx.dispatch(new_message_notification("C1"));
        fx.focus.leave();
        fx.dispatch(new_message_notification("C1"));

        assert!(matches!(rx.try_recv(), Ok(UiEvent::Notification(_))));
        assert!(rx.try_recv().is_err());
    }
}
