//! Focused conversation.
//!
//! One cell shared by the public API and the dispatch path. Dispatch reads
//! it on every frame, so a join made before a reconnect still applies after
//! it.

use tokio::sync::watch;

use crate::identifiers::ConversationId;

/// Holds at most one focused conversation id.
#[derive(Debug)]
pub struct FocusTracker {
    focused: watch::Sender<Option<ConversationId>>,
}

impl Default for FocusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusTracker {
    /// Creates a tracker with nothing focused.
    #[must_use]
    pub fn new() -> Self {
        let (focused, _) = watch::channel(None);
        Self { focused }
    }

    /// Focuses `conversation_id`, replacing any previous focus.
    pub fn join(&self, conversation_id: ConversationId) {
        self.focused.send_if_modified(|current| {
            if current.as_ref() == Some(&conversation_id) {
                return false;
            }
            *current = Some(conversation_id);
            true
        });
    }

    /// Clears the focus. Returns the conversation that was focused.
    pub fn leave(&self) -> Option<ConversationId> {
        let mut previous = None;
        self.focused.send_if_modified(|current| {
            previous = current.take();
            previous.is_some()
        });
        previous
    }

    /// Returns the focused conversation.
    #[inline]
    #[must_use]
    pub fn focused(&self) -> Option<ConversationId> {
        self.focused.borrow().clone()
    }

    /// Returns `true` if `conversation_id` is focused.
    #[inline]
    #[must_use]
    pub fn is_focused(&self, conversation_id: &ConversationId) -> bool {
        self.focused.borrow().as_ref() == Some(conversation_id)
    }

    /// Subscribes to focus changes.
    #[inline]
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<ConversationId>> {
        self.focused.subscribe()
    }
}
