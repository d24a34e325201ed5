//! Authentication collaborator input.
//!
//! Token issuance and verification live elsewhere. This core only needs a
//! boolean signal plus the identity of whoever is signed in.

use serde::{Deserialize, Serialize};

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// Account email.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl UserIdentity {
    /// Creates an identity from an email.
    #[inline]
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Sets the display name.
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Snapshot of the external authentication signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// Whether a session is active.
    pub authenticated: bool,
    /// Who is signed in, when known.
    pub user: Option<UserIdentity>,
}

impl AuthState {
    /// Authenticated as `user`.
    #[inline]
    #[must_use]
    pub fn signed_in(user: UserIdentity) -> Self {
        Self {
            authenticated: true,
            user: Some(user),
        }
    }

    /// Not authenticated.
    #[inline]
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Returns the boolean signal.
    #[inline]
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
