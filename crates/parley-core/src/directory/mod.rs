//! User directory
//!
//! Registration, existence checks, and prefix search over the flat
//! `/users` listing. User records live under `/{safe_email}` and are
//! immutable after registration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::identity::{normalize, SafeEmail};
use crate::store::DocumentStore;
use crate::{Error, Result};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
}

impl User {
    /// Create a user from registration input
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email_address: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email_address: email_address.into(),
        }
    }

    /// Canonical storage key for this user
    pub fn safe_email(&self) -> SafeEmail {
        SafeEmail::from_raw(&self.email_address)
    }

    /// Display name used in the directory listing
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Storage key of the user's profile picture. The key shape is what
    /// existing stored data uses; the picture itself is handled elsewhere.
    pub fn profile_picture_key(&self) -> String {
        format!("{}_Profile_Picture_png", self.safe_email())
    }
}

/// Stored shape of a user's root record (without the conversations list,
/// which is attached later by the conversation store)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    first_name: String,
    last_name: String,
    #[serde(rename = "emailAddress")]
    email_address: String,
}

/// One row of the flat `/users` listing used for search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub email: String,
}

/// Registered-user lookup and search
///
/// The `/users` listing is fetched once and cached for the process
/// lifetime with no TTL or invalidation: users registered after the first
/// fetch stay invisible to `search` until the process restarts. Inherited
/// behavior, covered by a test.
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
    listing: RwLock<Option<Vec<DirectoryEntry>>>,
}

impl UserDirectory {
    /// Create a directory over the given backing store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            listing: RwLock::new(None),
        }
    }

    /// True iff a user record is stored under `normalize(email)`
    pub async fn exists(&self, email: &str) -> Result<bool> {
        Ok(self.store.load(&normalize(email)).await?.is_some())
    }

    /// Register a new user.
    ///
    /// Check-then-write: `AlreadyExists` when the safe key is taken, then
    /// two writes (the root record, then the `/users` listing append) with
    /// no transaction around them. Two racing registrations of one address
    /// can both pass the check; the window is inherited, not hidden.
    pub async fn register(&self, user: &User) -> Result<()> {
        let safe = user.safe_email();
        if self.exists(&user.email_address).await? {
            return Err(Error::AlreadyExists(format!("user {safe}")));
        }

        let record = UserRecord {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email_address: user.email_address.clone(),
        };
        self.store
            .save(safe.as_str(), serde_json::to_value(&record)?)
            .await?;

        let mut listing = match self.store.load("users").await? {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                warn!("users listing is not an array ({other}), rebuilding");
                Vec::new()
            }
            None => Vec::new(),
        };
        listing.push(json!({
            "name": user.display_name(),
            "email": safe.as_str(),
        }));
        self.store.save("users", Value::Array(listing)).await?;

        debug!(user = %safe, "registered");
        Ok(())
    }

    /// Case-insensitive prefix search on directory names.
    ///
    /// `NotFound` when no user has ever been registered (the `/users` node
    /// does not exist yet).
    pub async fn search(&self, prefix: &str) -> Result<Vec<DirectoryEntry>> {
        self.ensure_listing().await?;

        let needle = prefix.to_lowercase();
        let listing = self.listing.read().await;
        Ok(listing
            .iter()
            .flatten()
            .filter(|entry| entry.name.to_lowercase().starts_with(&needle))
            .cloned()
            .collect())
    }

    /// Fetch the `/users` listing on first use; later calls serve the cache.
    async fn ensure_listing(&self) -> Result<()> {
        if self.listing.read().await.is_some() {
            return Ok(());
        }

        let value = self
            .store
            .load("users")
            .await?
            .ok_or_else(|| Error::NotFound("users listing".to_string()))?;
        let entries: Vec<DirectoryEntry> = serde_json::from_value(value)
            .map_err(|e| Error::Decode(format!("users listing: {e}")))?;

        debug!(count = entries.len(), "cached users listing");
        *self.listing.write().await = Some(entries);
        Ok(())
    }
}
