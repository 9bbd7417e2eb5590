//! Messenger facade
//!
//! The complete surface a client UI talks to: create-user, user-exists,
//! search-users, create-conversation, list-conversations, append-message,
//! read-conversation. All operations are asynchronous request/result calls
//! with no synchronous variants; the UI layers (out of scope here) sit on
//! top of exactly this type.

use std::sync::Arc;

use crate::config::Config;
use crate::conversation::{Conversation, ConversationStore};
use crate::directory::{DirectoryEntry, User, UserDirectory};
use crate::identity::Session;
use crate::message::Message;
use crate::store::DocumentStore;
use crate::Result;

/// One handle over a backing store, wiring the directory, the conversation
/// store, and the message log together
pub struct Messenger {
    store: Arc<dyn DocumentStore>,
    directory: UserDirectory,
    conversations: ConversationStore,
}

impl Messenger {
    /// Create a messenger over an already-open backing store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            directory: UserDirectory::new(store.clone()),
            conversations: ConversationStore::new(store.clone()),
            store,
        }
    }

    /// Open the store named by `config` and build a messenger over it
    pub async fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.open_store().await?))
    }

    /// The shared backing store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Register a new user
    pub async fn create_user(&self, user: &User) -> Result<()> {
        self.directory.register(user).await
    }

    /// Check whether an identity is registered
    pub async fn user_exists(&self, email: &str) -> Result<bool> {
        self.directory.exists(email).await
    }

    /// Case-insensitive prefix search over the user directory
    pub async fn search_users(&self, prefix: &str) -> Result<Vec<DirectoryEntry>> {
        self.directory.search(prefix).await
    }

    /// Start a conversation from its first message; returns the new
    /// conversation id
    pub async fn create_conversation(
        &self,
        session: &Session,
        peer_email: &str,
        peer_name: &str,
        first_message: &Message,
    ) -> Result<String> {
        self.conversations
            .create(session, peer_email, peer_name, first_message)
            .await
    }

    /// List an account's conversation summaries
    pub async fn list_conversations(&self, owner_email: &str) -> Result<Vec<Conversation>> {
        self.conversations.list(owner_email).await
    }

    /// Append a message to an existing conversation, refreshing both
    /// participants' summaries
    pub async fn append_message(
        &self,
        session: &Session,
        conversation_id: &str,
        message: &Message,
    ) -> Result<()> {
        self.conversations
            .append(session, conversation_id, message)
            .await
    }

    /// Read a conversation's full ordered history
    pub async fn read_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.conversations.log().read(conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{allocate_message_id, MessageKind};
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn messenger() -> Messenger {
        Messenger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn registration_scenario() {
        // register {first: "A", last: "B", email: "a.b@x.com"}
        // -> stored under "a-b-x-com", exists() true afterwards
        let messenger = messenger();
        let user = User::new("A", "B", "a.b@x.com");
        assert_eq!(user.safe_email().as_str(), "a-b-x-com");

        messenger.create_user(&user).await.unwrap();
        assert!(messenger.user_exists("a.b@x.com").await.unwrap());

        let hits = messenger.search_users("a").await.unwrap();
        assert_eq!(hits, vec![DirectoryEntry {
            name: "A B".to_string(),
            email: "a-b-x-com".to_string(),
        }]);
    }

    #[tokio::test]
    async fn conversation_scenario() {
        let messenger = messenger();
        messenger.create_user(&User::new("A", "B", "a.b@x.com")).await.unwrap();
        messenger.create_user(&User::new("C", "D", "c.d@y.com")).await.unwrap();

        let session = Session::new("a.b@x.com", "A B");
        let sent = Utc.with_ymd_and_hms(2023, 11, 23, 17, 32, 10).unwrap();
        let first = Message::outgoing(&session, "c.d@y.com", MessageKind::Text("hi".into()), sent);
        assert_eq!(first.id, allocate_message_id("c.d@y.com", &session, sent));

        let id = messenger
            .create_conversation(&session, "c.d@y.com", "C D", &first)
            .await
            .unwrap();
        assert_eq!(id, format!("conversations_{}", first.id));

        let listed = messenger.list_conversations("a.b@x.com").await.unwrap();
        assert_eq!(listed[0].latest_message.text, "hi");
        assert!(!listed[0].latest_message.is_read);
    }

    #[tokio::test]
    async fn append_then_read_returns_tail() {
        let messenger = messenger();
        messenger.create_user(&User::new("A", "B", "a.b@x.com")).await.unwrap();
        messenger.create_user(&User::new("C", "D", "c.d@y.com")).await.unwrap();

        let session = Session::new("a.b@x.com", "A B");
        let first = Message::outgoing(
            &session,
            "c.d@y.com",
            MessageKind::Text("hi".into()),
            Utc.with_ymd_and_hms(2023, 11, 23, 17, 32, 10).unwrap(),
        );
        let id = messenger
            .create_conversation(&session, "c.d@y.com", "C D", &first)
            .await
            .unwrap();

        let reply = Message::outgoing(
            &session,
            "c.d@y.com",
            MessageKind::Text("anyone there?".into()),
            Utc.with_ymd_and_hms(2023, 11, 23, 17, 32, 11).unwrap(),
        );
        messenger.append_message(&session, &id, &reply).await.unwrap();

        let history = messenger.read_conversation(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().unwrap(), &reply);
    }
}
