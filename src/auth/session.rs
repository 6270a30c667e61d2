//! Per-request session state.

use crate::db::{Role, User};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Minimal identity bound into an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// User ID.
    pub id: String,
    /// Username.
    pub username: String,
    /// Account role.
    pub role: Role,
}

impl SessionIdentity {
    /// Check if the identity belongs to an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for SessionIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Browser session passed to and from the auth service on each request.
///
/// Starts anonymous. `login` binds an identity, `logout` clears everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    identity: Option<SessionIdentity>,
    permanent: bool,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    /// New anonymous session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Bound identity, ignoring expiry.
    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    /// Bound identity if the session has not expired at `now`.
    pub fn current_identity_at(&self, now: DateTime<Utc>) -> Option<&SessionIdentity> {
        match self.expires_at {
            Some(expires_at) if expires_at <= now => None,
            _ => self.identity.as_ref(),
        }
    }

    /// Bound identity if the session has not expired yet.
    pub fn current_identity(&self) -> Option<&SessionIdentity> {
        self.current_identity_at(Utc::now())
    }

    /// Whether an identity is bound.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Whether the session outlives the browser.
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// Expiry of a permanent session.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Bind `identity` as a permanent session lasting `lifetime` from `now`.
    pub(crate) fn bind(&mut self, identity: SessionIdentity, now: DateTime<Utc>, lifetime: Duration) {
        self.identity = Some(identity);
        self.permanent = true;
        self.expires_at = Some(now + lifetime);
    }

    /// Drop all session state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
