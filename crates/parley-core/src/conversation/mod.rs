//! Conversation store
//!
//! Per-account conversation summaries plus the orchestration of message
//! sends. Each participant owns an independent summary list under
//! `/{safe_email}/conversations`; two participants hold structurally
//! distinct records for the same logical thread, and the records are never
//! merged: collapsing them into one shared entity would change per-
//! participant read-state semantics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::identity::{normalize, Session};
use crate::message::{format_date, Message, MessageLog, MessageRecord};
use crate::store::{descend, DocumentStore};
use crate::{Error, Result};

/// Denormalized cache of a conversation's latest message and read state.
/// Mutated on every append by either participant; the message log stays the
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestMessage {
    pub date: String,
    #[serde(rename = "message")]
    pub text: String,
    pub is_read: bool,
}

/// One conversation as seen by one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// `"conversations_" + first message id`, stable for the thread's lifetime
    pub id: String,
    /// Display name of the peer
    pub name: String,
    /// Raw email address of the peer
    pub other_user_email: String,
    pub latest_message: LatestMessage,
}

/// Conversation summaries and send orchestration over a backing store
#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn DocumentStore>,
    log: MessageLog,
}

impl ConversationStore {
    /// Create a store sharing the given backend
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let log = MessageLog::new(store.clone());
        Self { store, log }
    }

    /// The underlying message log
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Start a new conversation with `peer_email` from its first message.
    ///
    /// The conversation id is generated once, from the triggering message
    /// id, and never changes. Two-phase write: the owner's summary first,
    /// then the log append, with no rollback. A failed log write leaves a
    /// summary pointing at a missing log. Known failure window, kept from
    /// the stored contract.
    pub async fn create(
        &self,
        session: &Session,
        peer_email: &str,
        peer_name: &str,
        first_message: &Message,
    ) -> Result<String> {
        let owner = session.safe_email();
        let mut node = self
            .store
            .load(owner.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {owner}")))?;
        if !node.is_object() {
            return Err(Error::Decode(format!("user record {owner} is not an object")));
        }

        let conversation_id = format!("conversations_{}", first_message.id);
        let summary = json!({
            "id": conversation_id,
            "other_user_email": peer_email,
            "name": peer_name,
            "latest_message": {
                "date": format_date(first_message.sent_date),
                "message": first_message.kind.content(),
                "is_read": false,
            },
        });

        match node.get_mut("conversations").and_then(Value::as_array_mut) {
            Some(conversations) => conversations.push(summary),
            None => {
                node["conversations"] = json!([summary]);
            }
        }
        self.store.save(owner.as_str(), node).await?;

        self.log
            .append(
                &conversation_id,
                MessageRecord::from_message(first_message, peer_name),
            )
            .await?;

        debug!(%owner, %conversation_id, "created conversation");
        Ok(conversation_id)
    }

    /// List an account's conversations.
    ///
    /// Best-effort partial results: a stored summary missing required
    /// fields is skipped with a warning instead of failing the batch.
    pub async fn list(&self, owner_email: &str) -> Result<Vec<Conversation>> {
        let owner = normalize(owner_email);
        let node = self
            .store
            .load(&owner)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {owner}")))?;

        let conversations = descend(&node, "conversations")
            .ok_or_else(|| Error::NotFound(format!("conversations for {owner}")))?;
        let entries = conversations
            .as_array()
            .ok_or_else(|| Error::Decode(format!("conversations for {owner} is not a list")))?;

        Ok(entries
            .iter()
            .filter_map(|entry| match serde_json::from_value(entry.clone()) {
                Ok(conversation) => Some(conversation),
                Err(e) => {
                    warn!(%owner, "skipping malformed conversation record: {e}");
                    None
                }
            })
            .collect())
    }

    /// Append a message to an existing conversation.
    ///
    /// The log grows by one record, then the sender's summary and the
    /// recipient's summary are refreshed (the recipient is resolved from
    /// the sender's stored summary, and the recipient's copy is created if
    /// it does not exist yet). Both copies are marked unread. Three writes,
    /// no rollback; an early failure leaves the later phases unapplied.
    pub async fn append(
        &self,
        session: &Session,
        conversation_id: &str,
        message: &Message,
    ) -> Result<()> {
        let owner = session.safe_email();
        let mut owner_node = self
            .store
            .load(owner.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {owner}")))?;

        let owner_summary = find_summary(&owner_node, conversation_id).ok_or_else(|| {
            Error::NotFound(format!("conversation {conversation_id} for {owner}"))
        })?;
        let peer_email = owner_summary
            .get("other_user_email")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::Decode(format!("summary {conversation_id} has no other_user_email"))
            })?
            .to_string();
        let peer_name = owner_summary
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&peer_email)
            .to_string();

        self.log
            .append(
                conversation_id,
                MessageRecord::from_message(message, &peer_name),
            )
            .await?;

        let latest = json!({
            "date": format_date(message.sent_date),
            "message": message.kind.content(),
            "is_read": false,
        });

        // Sender's copy
        set_latest(&mut owner_node, conversation_id, latest.clone()).ok_or_else(|| {
            Error::NotFound(format!("conversation {conversation_id} for {owner}"))
        })?;
        self.store.save(owner.as_str(), owner_node).await?;

        // Recipient's copy, created on first delivery
        let recipient = normalize(&peer_email);
        let mut recipient_node = self
            .store
            .load(&recipient)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {recipient}")))?;
        if !recipient_node.is_object() {
            return Err(Error::Decode(format!(
                "user record {recipient} is not an object"
            )));
        }

        if set_latest(&mut recipient_node, conversation_id, latest.clone()).is_none() {
            let summary = json!({
                "id": conversation_id,
                "other_user_email": session.email_address,
                "name": session.display_name,
                "latest_message": latest,
            });
            match recipient_node
                .get_mut("conversations")
                .and_then(Value::as_array_mut)
            {
                Some(conversations) => conversations.push(summary),
                None => {
                    recipient_node["conversations"] = json!([summary]);
                }
            }
        }
        self.store.save(&recipient, recipient_node).await?;

        debug!(%owner, conversation_id, "appended message");
        Ok(())
    }
}

/// Locate a summary by conversation id inside a loaded account node
fn find_summary<'a>(node: &'a Value, conversation_id: &str) -> Option<&'a Value> {
    node.get("conversations")?
        .as_array()?
        .iter()
        .find(|entry| entry.get("id").and_then(Value::as_str) == Some(conversation_id))
}

/// Replace the `latest_message` of the matching summary; `None` when the
/// account holds no summary for this conversation
fn set_latest(node: &mut Value, conversation_id: &str, latest: Value) -> Option<()> {
    let entry = node
        .get_mut("conversations")?
        .as_array_mut()?
        .iter_mut()
        .find(|entry| entry.get("id").and_then(Value::as_str) == Some(conversation_id))?;
    entry["latest_message"] = latest;
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{User, UserDirectory};
    use crate::message::MessageKind;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    async fn seeded() -> (Arc<MemoryStore>, ConversationStore) {
        let store = Arc::new(MemoryStore::new());
        let directory = UserDirectory::new(store.clone());
        directory.register(&User::new("A", "B", "a.b@x.com")).await.unwrap();
        directory.register(&User::new("C", "D", "c.d@y.com")).await.unwrap();
        (store.clone(), ConversationStore::new(store))
    }

    fn session() -> Session {
        Session::new("a.b@x.com", "A B")
    }

    fn ts(seconds: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 23, 17, 32, seconds).unwrap()
    }

    fn text_message(seconds: u32, text: &str) -> Message {
        Message::outgoing(
            &session(),
            "c.d@y.com",
            MessageKind::Text(text.to_string()),
            ts(seconds),
        )
    }

    #[tokio::test]
    async fn create_returns_prefixed_message_id() {
        let (_, conversations) = seeded().await;
        let first = text_message(10, "hi");

        let id = conversations
            .create(&session(), "c.d@y.com", "C D", &first)
            .await
            .unwrap();
        assert_eq!(id, format!("conversations_{}", first.id));
    }

    #[tokio::test]
    async fn create_writes_unread_summary_and_log() {
        let (_, conversations) = seeded().await;
        let first = text_message(10, "hi");
        let id = conversations
            .create(&session(), "c.d@y.com", "C D", &first)
            .await
            .unwrap();

        let listed = conversations.list("a.b@x.com").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].name, "C D");
        assert_eq!(listed[0].other_user_email, "c.d@y.com");
        assert_eq!(listed[0].latest_message.text, "hi");
        assert!(!listed[0].latest_message.is_read);

        let history = conversations.log().read(&id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind.content(), "hi");
    }

    #[tokio::test]
    async fn create_fails_for_unknown_owner() {
        let store = Arc::new(MemoryStore::new());
        let conversations = ConversationStore::new(store);

        let err = conversations
            .create(&session(), "c.d@y.com", "C D", &text_message(10, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn create_appends_to_existing_list() {
        let (_, conversations) = seeded().await;
        conversations
            .create(&session(), "c.d@y.com", "C D", &text_message(10, "hi"))
            .await
            .unwrap();
        conversations
            .create(&session(), "c.d@y.com", "C D", &text_message(11, "again"))
            .await
            .unwrap();

        assert_eq!(conversations.list("a.b@x.com").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_without_conversations_is_not_found() {
        let (_, conversations) = seeded().await;
        let err = conversations.list("a.b@x.com").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn list_skips_malformed_records() {
        let (store, conversations) = seeded().await;
        conversations
            .create(&session(), "c.d@y.com", "C D", &text_message(10, "hi"))
            .await
            .unwrap();

        // Corrupt the list with an entry missing required fields
        let mut node = store.load("a-b-x-com").await.unwrap().unwrap();
        node["conversations"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "conversations_bad"}));
        store.save("a-b-x-com", node).await.unwrap();

        let listed = conversations.list("a.b@x.com").await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn append_updates_both_summaries() {
        let (_, conversations) = seeded().await;
        let id = conversations
            .create(&session(), "c.d@y.com", "C D", &text_message(10, "hi"))
            .await
            .unwrap();

        conversations
            .append(&session(), &id, &text_message(11, "how are you"))
            .await
            .unwrap();

        // Sender's copy refreshed
        let sender_side = conversations.list("a.b@x.com").await.unwrap();
        assert_eq!(sender_side[0].latest_message.text, "how are you");
        assert!(!sender_side[0].latest_message.is_read);

        // Recipient's copy created on first delivery, pointing back at the sender
        let recipient_side = conversations.list("c.d@y.com").await.unwrap();
        assert_eq!(recipient_side.len(), 1);
        assert_eq!(recipient_side[0].id, id);
        assert_eq!(recipient_side[0].other_user_email, "a.b@x.com");
        assert_eq!(recipient_side[0].name, "A B");
        assert_eq!(recipient_side[0].latest_message.text, "how are you");
        assert!(!recipient_side[0].latest_message.is_read);
    }

    #[tokio::test]
    async fn append_extends_the_log_tail() {
        let (_, conversations) = seeded().await;
        let id = conversations
            .create(&session(), "c.d@y.com", "C D", &text_message(10, "hi"))
            .await
            .unwrap();

        let appended = text_message(11, "newest");
        conversations.append(&session(), &id, &appended).await.unwrap();

        let history = conversations.log().read(&id).await.unwrap();
        assert_eq!(history.last().unwrap().id, appended.id);
        assert_eq!(history.last().unwrap().kind.content(), "newest");
    }

    #[tokio::test]
    async fn append_requires_sender_summary() {
        let (_, conversations) = seeded().await;
        let err = conversations
            .append(&session(), "conversations_missing", &text_message(10, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn append_surfaces_id_collision() {
        let (_, conversations) = seeded().await;
        let id = conversations
            .create(&session(), "c.d@y.com", "C D", &text_message(10, "hi"))
            .await
            .unwrap();

        // Same pair, same second as the first message: same id
        let err = conversations
            .append(&session(), &id, &text_message(10, "duplicate"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IdCollision(_)));
    }

    #[tokio::test]
    async fn summaries_stay_per_participant() {
        let (_, conversations) = seeded().await;
        let id = conversations
            .create(&session(), "c.d@y.com", "C D", &text_message(10, "hi"))
            .await
            .unwrap();
        conversations
            .append(&session(), &id, &text_message(11, "hello"))
            .await
            .unwrap();

        // The two accounts hold distinct records for one logical thread
        let sender_side = conversations.list("a.b@x.com").await.unwrap();
        let recipient_side = conversations.list("c.d@y.com").await.unwrap();
        assert_eq!(sender_side[0].id, recipient_side[0].id);
        assert_ne!(
            sender_side[0].other_user_email,
            recipient_side[0].other_user_email
        );
    }
}
