//! Parley Core Library
//!
//! This crate provides the persistence core of the Parley messaging client:
//! - Identity normalization and session context
//! - User directory (registration, existence checks, prefix search)
//! - Conversation store (per-account summaries)
//! - Append-only message logs
//! - Message codec (tagged content union <-> stored records)
//! - Pluggable document-store backends (memory, SQLite, hosted HTTP)

pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod identity;
pub mod message;
pub mod service;
pub mod store;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::conversation::{Conversation, LatestMessage};
    pub use crate::directory::User;
    pub use crate::error::{Error, Result};
    pub use crate::identity::{normalize, SafeEmail, Session};
    pub use crate::message::{Message, MessageKind};
    pub use crate::service::Messenger;
    pub use crate::store::DocumentStore;
}
