//! Per-conversation message lists.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::identifiers::ConversationId;
use crate::models::Message;

// ============================================================================
// ConversationStore
// ============================================================================

/// Message lists keyed by conversation, in insertion order, unique by id.
///
/// Every mutation, whether from an inbound frame or a direct call, goes
/// through [`append`](Self::append) or [`hydrate`](Self::hydrate).
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: RwLock<FxHashMap<ConversationId, Vec<Message>>>,
}

impl ConversationStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole list for `conversation_id`.
    ///
    /// Repeated ids within `messages` keep their first occurrence.
    pub fn hydrate(&self, conversation_id: ConversationId, mut messages: Vec<Message>) {
        let mut seen = FxHashSet::default();
        messages.retain(|message| seen.insert(message.id.clone()));
        self.conversations.write().insert(conversation_id, messages);
    }

    /// Appends `message` unless one with the same id is already stored.
    ///
    /// Returns `true` if the message was added.
    pub fn append(&self, conversation_id: ConversationId, message: Message) -> bool {
        let mut conversations = self.conversations.write();
        let list = conversations.entry(conversation_id).or_default();

        if list.iter().any(|existing| existing.id == message.id) {
            return false;
        }

        list.push(message);
        true
    }

    /// Returns a copy of one conversation's messages.
    #[must_use]
    pub fn messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.conversations
            .read()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of messages stored for `conversation_id`.
    #[inline]
    #[must_use]
    pub fn len(&self, conversation_id: &ConversationId) -> usize {
        self.conversations
            .read()
            .get(conversation_id)
            .map_or(0, Vec::len)
    }

    /// Returns `true` if the store holds `conversation_id`.
    #[inline]
    #[must_use]
    pub fn contains(&self, conversation_id: &ConversationId) -> bool {
        self.conversations.read().contains_key(conversation_id)
    }

    /// Returns a copy of every conversation.
    #[must_use]
    pub fn snapshot(&self) -> FxHashMap<ConversationId, Vec<Message>> {
        self.conversations.read().clone()
    }

    /// Drops every conversation.
    pub fn clear(&self) {
        self.conversations.write().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
