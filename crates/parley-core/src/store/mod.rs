//! Document store abstraction
//!
//! The backing store is modeled as a flat namespace of JSON documents, one
//! per top-level node: `/{safe_email}`, `/users`, `/{conversation_id}`. Any
//! backend that can load and save whole nodes satisfies the contract.
//!
//! # Architecture
//!
//! - [`DocumentStore`]: the async trait every backend implements
//! - [`memory`]: in-memory map, used by tests and as a local cache
//! - [`sqlite`]: SQLite-backed store (connection pool + migrations)
//! - [`http`]: hosted realtime-database REST backend
//!
//! Reads below the node level (`/{safe_email}/conversations`) are resolved
//! client-side with [`descend`]; writes always replace a whole node. That
//! whole-node rewrite is the consistency unit: two concurrent writers to the
//! same node race read-modify-write and the last write wins.

pub mod http;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use sqlite::{Database, DatabaseConfig, SqliteStore};

/// Asynchronous whole-document storage.
///
/// Every operation suspends at the point of I/O and resumes on completion;
/// no implementation may block the caller on a dedicated worker thread owned
/// by this crate.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the document stored under `key`, or `None` if absent.
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any existing document.
    async fn save(&self, key: &str, value: Value) -> Result<()>;
}

/// Resolve a nested path (`"conversations"`, `"latest_message/date"`) inside
/// a loaded document. Returns `None` when any segment is missing or the
/// intermediate value is not an object.
pub fn descend<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
