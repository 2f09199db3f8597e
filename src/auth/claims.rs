//! Session claims and the identity attached to authenticated requests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::UnixSeconds;

/// Opaque, stable user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Caller identity as seen by handlers.
///
/// `display_name` and `email` are a snapshot from sign-in time and are not
/// authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject_id: SubjectId,
    pub display_name: String,
    pub email: String,
    pub is_admin: bool,
}

/// Claims signed into a session credential.
///
/// Claims are never mutated after issuance; renewal builds a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id: SubjectId,
    pub username: String,
    pub email: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    pub iat: UnixSeconds,
    pub exp: UnixSeconds,
    /// Original sign-in instant, preserved across renewals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<UnixSeconds>,
}

impl SessionClaims {
    /// Claims for a fresh sign-in.
    pub fn issue(identity: &Identity, now: UnixSeconds, lifetime_secs: u64) -> Self {
        debug_assert!(lifetime_secs > 0);
        Self {
            id: identity.subject_id.clone(),
            username: identity.display_name.clone(),
            email: identity.email.clone(),
            is_admin: identity.is_admin,
            iat: now,
            exp: now.saturating_add(lifetime_secs.max(1)),
            auth_time: Some(now),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.id.clone(),
            display_name: self.username.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }

    /// When the caller originally signed in.
    pub fn authenticated_at(&self) -> UnixSeconds {
        self.auth_time.unwrap_or(self.iat)
    }

    /// Hard end of the session regardless of activity, if a ceiling applies.
    pub fn absolute_expiry(&self, ceiling_secs: Option<u64>) -> Option<UnixSeconds> {
        ceiling_secs.map(|c| self.authenticated_at().saturating_add(c))
    }

    /// Claims for the next credential in a sliding session.
    ///
    /// Returns `None` once the absolute ceiling has been reached.
    pub fn renewed(
        &self,
        now: UnixSeconds,
        lifetime_secs: u64,
        ceiling_secs: Option<u64>,
    ) -> Option<Self> {
        let sliding = now.saturating_add(lifetime_secs.max(1));
        let exp = match self.absolute_expiry(ceiling_secs) {
            Some(hard) if now >= hard => return None,
            Some(hard) => sliding.min(hard),
            None => sliding,
        };

        Some(Self {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
            iat: now,
            exp,
            auth_time: Some(self.authenticated_at()),
        })
    }
}
