//! Identity normalization and session context
//!
//! Raw email addresses contain characters the backing store rejects in node
//! keys, so every lookup key goes through [`normalize`] first. The session
//! context carries the current user explicitly; no operation reads ambient
//! global state to find out who is acting.

use serde::{Deserialize, Serialize};

/// Convert a raw email/username into a canonical storage-safe key.
///
/// Replaces every `.` and every `@` with `-`. Deterministic, pure, and
/// idempotent. Known limitation: two raw identities that differ only in the
/// substituted characters collide (`a.b@x.com` and `a-b@x-com` both map to
/// `a-b-x-com`). The legacy store shares this ambiguity and existing data
/// depends on it, so it is documented rather than resolved.
pub fn normalize(raw: &str) -> String {
    raw.replace('.', "-").replace('@', "-")
}

/// A canonicalized identity, usable as a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafeEmail(String);

impl SafeEmail {
    /// Normalize a raw identity into a safe key
    pub fn from_raw(raw: &str) -> Self {
        Self(normalize(raw))
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SafeEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SafeEmail> for String {
    fn from(safe: SafeEmail) -> Self {
        safe.0
    }
}

/// The acting user, passed explicitly to every store operation that needs one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Raw email address of the signed-in user
    pub email_address: String,
    /// Display name shown to peers
    pub display_name: String,
}

impl Session {
    /// Create a session for the given user
    pub fn new(email_address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            display_name: display_name.into(),
        }
    }

    /// The user's canonical storage key
    pub fn safe_email(&self) -> SafeEmail {
        SafeEmail::from_raw(&self.email_address)
    }
}
