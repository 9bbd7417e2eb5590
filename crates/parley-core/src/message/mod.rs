//! Messages and the message codec
//!
//! A message is `{id, sender_email, sent_date, kind}` where `kind` is a
//! tagged union over the content types the client understands. Only the
//! `text` variant carries its payload through persistence; every other kind
//! is stored as its type tag with an empty content string. Existing stored
//! data has this shape, so the limitation is kept rather than extended.

pub mod log;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Session;
use crate::{Error, Result};

pub use log::MessageLog;

/// Fixed date format for every persisted date string: medium date, long
/// time, 12-hour clock, always UTC. Second granularity. Must stay exactly
/// this string for interop with existing stored data.
pub const DATE_FORMAT: &str = "%b %-d, %Y at %-I:%M:%S %p UTC";

/// Format a timestamp the way the store expects it
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored date string back into a timestamp
pub fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| Error::Decode(format!("bad date '{s}': {e}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// A remote media payload (photo, video, audio)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: Option<String>,
}

/// A geographic point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A shared contact card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactCard {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A link preview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkItem {
    pub title: String,
    pub url: String,
}

/// Message content union
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageKind {
    Text(String),
    AttributedText(String),
    Photo(MediaItem),
    Video(MediaItem),
    Location(Coordinate),
    Emoji(String),
    Audio(MediaItem),
    Contact(ContactCard),
    LinkPreview(LinkItem),
    Custom(serde_json::Value),
}

impl MessageKind {
    /// The stored type tag for this kind
    pub fn type_tag(&self) -> &'static str {
        match self {
            MessageKind::Text(_) => "text",
            MessageKind::AttributedText(_) => "attributed_text",
            MessageKind::Photo(_) => "photo",
            MessageKind::Video(_) => "video",
            MessageKind::Location(_) => "location",
            MessageKind::Emoji(_) => "emoji",
            MessageKind::Audio(_) => "audio",
            MessageKind::Contact(_) => "contact",
            MessageKind::LinkPreview(_) => "link_preview",
            MessageKind::Custom(_) => "custom",
        }
    }

    /// The persisted content string: the payload for `text`, empty for
    /// everything else.
    pub fn content(&self) -> String {
        match self {
            MessageKind::Text(text) => text.clone(),
            _ => String::new(),
        }
    }

    /// Reconstruct a kind from its stored tag and content.
    ///
    /// Total over the nine known tags and round-trip-safe for `text`.
    /// Non-text payloads were never persisted, so those variants come back
    /// with empty payloads. Unknown tags are a decode failure.
    pub fn decode(type_tag: &str, content: &str) -> Result<Self> {
        match type_tag {
            "text" => Ok(MessageKind::Text(content.to_string())),
            "attributed_text" => Ok(MessageKind::AttributedText(content.to_string())),
            "photo" => Ok(MessageKind::Photo(MediaItem::default())),
            "video" => Ok(MessageKind::Video(MediaItem::default())),
            "location" => Ok(MessageKind::Location(Coordinate::default())),
            "emoji" => Ok(MessageKind::Emoji(content.to_string())),
            "audio" => Ok(MessageKind::Audio(MediaItem::default())),
            "contact" => Ok(MessageKind::Contact(ContactCard::default())),
            "link_preview" => Ok(MessageKind::LinkPreview(LinkItem::default())),
            "custom" => Ok(MessageKind::Custom(serde_json::Value::Null)),
            other => Err(Error::Decode(format!("unknown message type tag '{other}'"))),
        }
    }
}

/// A single message, immutable once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique id: `{peer}_{self_safe}_{formatted_timestamp}`
    pub id: String,
    /// Raw email address of the sender
    pub sender_email: String,
    /// When the message was sent
    pub sent_date: DateTime<Utc>,
    /// Content union
    pub kind: MessageKind,
}

impl Message {
    /// Create an outgoing message, allocating its id.
    ///
    /// The id is deterministic, NOT random: peer identity raw, own identity
    /// normalized, timestamp in the fixed format. Two messages between the
    /// same ordered pair inside one second therefore collide; the log
    /// rejects the second append with [`Error::IdCollision`].
    pub fn outgoing(
        session: &Session,
        peer_email: &str,
        kind: MessageKind,
        sent_date: DateTime<Utc>,
    ) -> Self {
        let id = allocate_message_id(peer_email, session, sent_date);
        Self {
            id,
            sender_email: session.email_address.clone(),
            sent_date,
            kind,
        }
    }
}

/// Build the deterministic message id for a send from `session` to `peer_email`
pub fn allocate_message_id(peer_email: &str, session: &Session, sent_date: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        peer_email,
        session.safe_email(),
        format_date(sent_date)
    )
}

/// Stored shape of one message inside a conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub content: String,
    pub date: String,
    pub sender_email: String,
    pub is_read: bool,
    pub name: String,
}

impl MessageRecord {
    /// Encode a message for storage. `name` is the display name shown for
    /// the conversation on the receiving side.
    pub fn from_message(message: &Message, name: &str) -> Self {
        Self {
            id: message.id.clone(),
            type_tag: message.kind.type_tag().to_string(),
            content: message.kind.content(),
            date: format_date(message.sent_date),
            sender_email: message.sender_email.clone(),
            is_read: false,
            name: name.to_string(),
        }
    }

    /// Decode back into a message, validating tag and date
    pub fn to_message(&self) -> Result<Message> {
        Ok(Message {
            id: self.id.clone(),
            sender_email: self.sender_email.clone(),
            sent_date: parse_date(&self.date)?,
            kind: MessageKind::decode(&self.type_tag, &self.content)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn date_format_is_exact() {
        assert_eq!(
            format_date(ts(2023, 11, 23, 17, 32, 10)),
            "Nov 23, 2023 at 5:32:10 PM UTC"
        );
        assert_eq!(
            format_date(ts(2024, 1, 5, 9, 4, 0)),
            "Jan 5, 2024 at 9:04:00 AM UTC"
        );
    }

    #[test]
    fn date_round_trips_through_format() {
        let instant = ts(2023, 11, 23, 17, 32, 10);
        assert_eq!(parse_date(&format_date(instant)).unwrap(), instant);
    }

    #[test]
    fn text_round_trips_through_codec() {
        let kind = MessageKind::Text("hello".to_string());
        let decoded = MessageKind::decode(kind.type_tag(), &kind.content()).unwrap();
        assert_eq!(decoded, kind);
    }

    #[test]
    fn non_text_payloads_are_not_persisted() {
        let kind = MessageKind::Photo(MediaItem {
            url: Some("https://cdn.example/p.png".to_string()),
        });
        assert_eq!(kind.type_tag(), "photo");
        assert_eq!(kind.content(), "");

        // Decoding brings the tag back with an empty payload
        let decoded = MessageKind::decode("photo", "").unwrap();
        assert_eq!(decoded, MessageKind::Photo(MediaItem::default()));
    }

    #[test]
    fn every_known_tag_decodes() {
        for tag in [
            "text",
            "attributed_text",
            "photo",
            "video",
            "location",
            "emoji",
            "audio",
            "contact",
            "link_preview",
            "custom",
        ] {
            let kind = MessageKind::decode(tag, "").unwrap();
            assert_eq!(kind.type_tag(), tag);
        }
    }

    #[test]
    fn unknown_tag_is_a_decode_error() {
        let err = MessageKind::decode("sticker", "").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn message_ids_collide_within_one_second() {
        // Same ordered pair, same formatted second: the ids are equal.
        // This is an inherited property of the id scheme, not a bug here.
        let session = Session::new("a.b@x.com", "A B");
        let instant = ts(2023, 11, 23, 17, 32, 10);

        let first = allocate_message_id("c.d@y.com", &session, instant);
        let second = allocate_message_id("c.d@y.com", &session, instant);
        assert_eq!(first, second);
        assert_eq!(first, "c.d@y.com_a-b-x-com_Nov 23, 2023 at 5:32:10 PM UTC");
    }

    #[test]
    fn message_ids_differ_across_seconds() {
        let session = Session::new("a.b@x.com", "A B");
        let first = allocate_message_id("c.d@y.com", &session, ts(2023, 11, 23, 17, 32, 10));
        let second = allocate_message_id("c.d@y.com", &session, ts(2023, 11, 23, 17, 32, 11));
        assert_ne!(first, second);
    }

    #[test]
    fn record_round_trips_a_text_message() {
        let session = Session::new("a.b@x.com", "A B");
        let message = Message::outgoing(
            &session,
            "c.d@y.com",
            MessageKind::Text("hi".to_string()),
            ts(2023, 11, 23, 17, 32, 10),
        );

        let record = MessageRecord::from_message(&message, "C D");
        assert_eq!(record.type_tag, "text");
        assert_eq!(record.content, "hi");
        assert!(!record.is_read);
        assert_eq!(record.name, "C D");

        let back = record.to_message().unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn record_serializes_with_stored_field_names() {
        let session = Session::new("a.b@x.com", "A B");
        let message = Message::outgoing(
            &session,
            "c.d@y.com",
            MessageKind::Text("hi".to_string()),
            ts(2023, 11, 23, 17, 32, 10),
        );
        let value = serde_json::to_value(MessageRecord::from_message(&message, "C D")).unwrap();

        assert!(value.get("type").is_some());
        assert!(value.get("sender_email").is_some());
        assert!(value.get("is_read").is_some());
        assert!(value.get("type_tag").is_none());
    }
}
