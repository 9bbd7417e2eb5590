//! Append-only message log
//!
//! One log per conversation id, stored as `/{conversation_id}` ->
//! `{messages: [MessageRecord]}`. Insertion order is send order; nothing is
//! ever deleted or reordered.
//!
//! The store has no append primitive, so every append re-reads the whole
//! sequence, extends it, and rewrites the node. That makes the log node the
//! consistency unit: two writers appending to the same conversation at once
//! race read-modify-write and the last write wins, dropping the earlier
//! message. This gap is inherited from the stored contract and reproduced
//! here; see DESIGN.md for the compare-and-swap hardening it would take to
//! close it.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use super::{Message, MessageRecord};
use crate::store::DocumentStore;
use crate::{Error, Result};

/// Append-only ordered message history per conversation
#[derive(Clone)]
pub struct MessageLog {
    store: Arc<dyn DocumentStore>,
}

impl MessageLog {
    /// Create a log over the given backing store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append one message record to a conversation's log.
    ///
    /// Creates the log on first append. Rejects a record whose id is
    /// already present with [`Error::IdCollision`]; with second-granularity
    /// ids this is a reachable condition, not a hypothetical one.
    pub async fn append(&self, conversation_id: &str, record: MessageRecord) -> Result<()> {
        let mut messages = match self.store.load(conversation_id).await? {
            Some(node) => stored_messages(conversation_id, &node)?,
            None => Vec::new(),
        };

        if messages
            .iter()
            .any(|m| m.get("id").and_then(Value::as_str) == Some(record.id.as_str()))
        {
            return Err(Error::IdCollision(record.id));
        }

        debug!(conversation_id, message_id = %record.id, "appending message");
        messages.push(serde_json::to_value(&record)?);
        self.store
            .save(conversation_id, json!({ "messages": messages }))
            .await
    }

    /// Read the full ordered history of a conversation.
    ///
    /// A missing log is `NotFound`; a malformed message record fails the
    /// whole read with `Decode`, because the log is the source of truth
    /// (unlike the summary cache, which skips bad entries).
    pub async fn read(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let node = self
            .store
            .load(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;

        stored_messages(conversation_id, &node)?
            .into_iter()
            .map(|value| {
                let record: MessageRecord = serde_json::from_value(value)
                    .map_err(|e| Error::Decode(format!("message in {conversation_id}: {e}")))?;
                record.to_message()
            })
            .collect()
    }
}

fn stored_messages(conversation_id: &str, node: &Value) -> Result<Vec<Value>> {
    node.get("messages")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| Error::Decode(format!("log {conversation_id} has no messages array")))
}
