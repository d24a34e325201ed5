//! Online counterpart users.

use parking_lot::RwLock;

use crate::models::OnlineUser;

/// Users currently online, in arrival order, unique by email.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    users: RwLock<Vec<OnlineUser>>,
}

impl PresenceTracker {
    /// Creates an empty tracker.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole roster.
    ///
    /// Later duplicates of an email are dropped.
    pub fn set_all(&self, users: Vec<OnlineUser>) {
        let mut roster: Vec<OnlineUser> = Vec::with_capacity(users.len());
        for user in users {
            if !roster.iter().any(|u| u.user_email == user.user_email) {
                roster.push(user);
            }
        }
        *self.users.write() = roster;
    }

    /// Adds `user` unless their email is already present.
    ///
    /// Returns `true` if the user was added.
    pub fn add(&self, user: OnlineUser) -> bool {
        let mut users = self.users.write();
        if users.iter().any(|u| u.user_email == user.user_email) {
            return false;
        }
        users.push(user);
        true
    }

    /// Removes the user with `user_email`.
    ///
    /// Returns `true` if someone was removed.
    pub fn remove(&self, user_email: &str) -> bool {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|u| u.user_email != user_email);
        users.len() != before
    }

    /// Returns `true` if `user_email` is online.
    #[inline]
    #[must_use]
    pub fn is_online(&self, user_email: &str) -> bool {
        self.users.read().iter().any(|u| u.user_email == user_email)
    }

    /// Returns a copy of the roster.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OnlineUser> {
        self.users.read().clone()
    }

    /// Returns the number of online users.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns `true` if nobody is online.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Empties the roster.
    pub fn clear(&self) {
        self.users.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> OnlineUser {
        OnlineUser::new(email, email.to_uppercase())
    }

    #[test]
    fn test_add_is_keyed_by_email() {
        let presence = PresenceTracker::new();
        assert!(presence.add(user("a@x")));
        assert!(!presence.add(OnlineUser::new("a@x", "Other Name")));
        assert_eq!(presence.len(), 1);
        assert_eq!(presence.snapshot()[0].user_name, "A@X");
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let presence = PresenceTracker::new();
        presence.add(user("a@x"));
        assert!(!presence.remove("b@x"));
        assert!(presence.remove("a@x"));
        assert!(presence.is_empty());
    }

    #[test]
    fn test_set_all_replaces() {
        let presence = PresenceTracker::new();
        presence.add(user("old@x"));
        presence.set_all(vec![user("a@x"), user("b@x"), user("a@x")]);

        let emails: Vec<_> = presence
            .snapshot()
            .into_iter()
            .map(|u| u.user_email)
            .collect();
        assert_eq!(emails, ["a@x", "b@x"]);
        assert!(!presence.is_online("old@x"));
    }
}
