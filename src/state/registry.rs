//! Frame-type subscriptions.
//!
//! Maps a frame type name to the callbacks registered for it, in
//! registration order.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::identifiers::SubscriptionId;

// ============================================================================
// Types
// ============================================================================

/// Subscriber callback, invoked with the frame payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registered handlers for one frame type, oldest first.
type HandlerList = Vec<(SubscriptionId, Handler)>;

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Subscriber callbacks keyed by frame type.
///
/// Dispatch takes a snapshot with [`handlers_for`](Self::handlers_for) and
/// invokes it without holding the lock, so callbacks may subscribe or
/// unsubscribe freely.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<FxHashMap<String, HandlerList>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("subscriptions", &self.len())
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `frame_type` and returns its id.
    pub fn register(&self, frame_type: impl Into<String>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.handlers
            .write()
            .entry(frame_type.into())
            .or_default()
            .push((id, handler));
        id
    }

    /// Removes exactly the subscription `id` registered under `frame_type`.
    ///
    /// Returns `false` if it was already gone.
    pub fn unregister(&self, frame_type: &str, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();

        let Some(list) = handlers.get_mut(frame_type) else {
            return false;
        };

        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;

        if list.is_empty() {
            handlers.remove(frame_type);
        }

        removed
    }

    /// Returns a snapshot of the handlers for `frame_type`, in registration
    /// order.
    #[must_use]
    pub fn handlers_for(&self, frame_type: &str) -> Vec<Handler> {
        self.handlers
            .read()
            .get(frame_type)
            .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if anything is subscribed to `frame_type`.
    #[inline]
    #[must_use]
    pub fn has_handlers(&self, frame_type: &str) -> bool {
        self.handlers.read().contains_key(frame_type)
    }

    /// Returns the number of subscriptions for `frame_type`.
    #[inline]
    #[must_use]
    pub fn count(&self, frame_type: &str) -> usize {
        self.handlers.read().get(frame_type).map_or(0, Vec::len)
    }

    /// Returns the total number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is subscribed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, Handler) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        let handler: Handler = Arc::new(move |_: &Value| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (hits, handler)
    }

    fn fire(registry: &HandlerRegistry, frame_type: &str) {
        for handler in registry.handlers_for(frame_type) {
            handler(&json!({}));
        }
    }

    #[test]
    fn test_multiple_subscribers_all_fire() {
        let registry = HandlerRegistry::new();
        let (first, h1) = counter();
        let (second, h2) = counter();

        registry.register("new_message", h1);
        registry.register("new_message", h2);
        fire(&registry, "new_message");

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.count("new_message"), 2);
    }

    #[test]
    fn test_unregister_removes_only_that_pair() {
        let registry = HandlerRegistry::new();
        let (first, h1) = counter();
        let (second, h2) = counter();

        let id1 = registry.register("new_message", h1);
        registry.register("new_message", h2);

        assert!(registry.unregister("new_message", id1));
        assert!(!registry.unregister("new_message", id1));
        fire(&registry, "new_message");

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_wrong_type_is_noop() {
        let registry = HandlerRegistry::new();
        let (_, handler) = counter();
        let id = registry.register("user_online", handler);

        assert!(!registry.unregister("user_offline", id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_lists_are_pruned() {
        let registry = HandlerRegistry::new();
        let (_, handler) = counter();
        let id = registry.register("typing", handler);

        assert!(registry.has_handlers("typing"));
        registry.unregister("typing", id);
        assert!(!registry.has_handlers("typing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let registry = HandlerRegistry::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            registry.register("x", Arc::new(move |_: &Value| order.lock().push(tag)));
        }
        fire(&registry, "x");

        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }
}
