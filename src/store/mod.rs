//! Data source abstraction over the bridge's chat/message/contact records.
//!
//! [`MessageStore`] is the read interface the resolver and query engine
//! consume. [`sqlite::SqliteStore`] reads the bridge's SQLite files;
//! [`memory::MemoryStore`] holds records in memory and evaluates the same
//! filter predicates defined here.

pub mod memory;
pub mod sqlite;

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::model::{local_part, Chat, Contact, Jid, Message};

/// Errors from the data source.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be interpreted.
    #[error("malformed row: {0}")]
    MalformedRow(String),
}

/// Primary ordering of message results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrder {
    /// Reverse-chronological.
    #[default]
    Newest,
    /// Chronological.
    Oldest,
}

impl MessageOrder {
    /// Compare two messages under this ordering (id breaks timestamp ties).
    pub fn compare(self, a: &Message, b: &Message) -> Ordering {
        let chrono = a.chrono_key().cmp(&b.chrono_key());
        match self {
            Self::Newest => chrono.reverse(),
            Self::Oldest => chrono,
        }
    }
}

/// Ordering of chat results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatOrder {
    /// Most recent activity first; chats without messages last.
    #[default]
    LastActive,
    /// Case-insensitive by name, falling back to the address.
    Name,
}

impl ChatOrder {
    /// Compare two chats under this ordering (address breaks ties).
    pub fn compare(self, a: &Chat, b: &Chat) -> Ordering {
        let primary = match self {
            Self::LastActive => match (a.last_message_time, b.last_message_time) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            Self::Name => chat_sort_name(a).cmp(&chat_sort_name(b)),
        };
        primary.then_with(|| a.jid.cmp(&b.jid))
    }
}

fn chat_sort_name(chat: &Chat) -> String {
    chat.name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(chat.jid.as_str())
        .to_lowercase()
}

/// Case-insensitive substring test.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Whether a stored sender value refers to the given address.
///
/// Stored senders may be bare local-parts, so comparison is by local-part.
pub fn sender_matches(sender: &str, jid: &Jid) -> bool {
    local_part(sender) == jid.user()
}

/// Order contacts by name (address when unnamed) and keep the first `limit`.
pub fn rank_contacts(mut contacts: Vec<Contact>, limit: usize) -> Vec<Contact> {
    contacts.sort_by(|a, b| {
        let key = |c: &Contact| {
            c.name
                .as_deref()
                .filter(|n| !n.is_empty())
                .unwrap_or(c.jid.as_str())
                .to_lowercase()
        };
        key(a).cmp(&key(b)).then_with(|| a.jid.cmp(&b.jid))
    });
    contacts.truncate(limit);
    contacts
}

/// Filter, order and page window for a message search.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageQuery {
    /// Inclusive lower time bound.
    pub after: Option<NaiveDateTime>,
    /// Exclusive upper time bound.
    pub before: Option<NaiveDateTime>,
    /// Sender address, already normalized.
    pub sender: Option<Jid>,
    /// Chat address.
    pub chat_jid: Option<Jid>,
    /// Case-insensitive content substring.
    pub text: Option<String>,
    /// Result ordering.
    pub order: MessageOrder,
    /// Page size.
    pub limit: usize,
    /// Number of matches to skip.
    pub offset: usize,
}

impl MessageQuery {
    /// Conjunction of all set filters.
    pub fn matches(&self, msg: &Message) -> bool {
        self.after.map_or(true, |t| msg.timestamp >= t)
            && self.before.map_or(true, |t| msg.timestamp < t)
            && self
                .sender
                .as_ref()
                .map_or(true, |s| sender_matches(&msg.sender, s))
            && self.chat_jid.as_ref().map_or(true, |c| msg.chat_jid == *c)
            && self
                .text
                .as_deref()
                .map_or(true, |t| contains_ci(&msg.content, t))
    }
}

/// Filter, order and page window for a chat listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatQuery {
    /// Case-insensitive substring of the name or address.
    pub text: Option<String>,
    /// Result ordering.
    pub order: ChatOrder,
    /// Whether to fill the last-message fields.
    pub include_last_message: bool,
    /// Page size.
    pub limit: usize,
    /// Number of chats to skip.
    pub offset: usize,
}

impl ChatQuery {
    /// Whether the chat passes the text filter.
    pub fn matches(&self, chat: &Chat) -> bool {
        self.text.as_deref().map_or(true, |t| {
            chat.name.as_deref().is_some_and(|n| contains_ci(n, t))
                || contains_ci(chat.jid.as_str(), t)
        })
    }
}

/// Messages surrounding an anchor in its chat, both halves chronological.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageWindow {
    /// Up to N messages immediately preceding the anchor.
    pub before: Vec<Message>,
    /// Up to N messages immediately following the anchor.
    pub after: Vec<Message>,
}

/// Record counts reported by `status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    /// Number of chats.
    pub chats: u64,
    /// Number of messages.
    pub messages: u64,
}

/// Read interface over the bridge's records.
///
/// "Not found" is expressed as `None` or an empty result; errors are reserved
/// for an unreachable or corrupt data source.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Look up a chat by address. With `include_last_message = false` only
    /// metadata is read and the last-message content fields stay empty.
    async fn find_chat(
        &self,
        jid: &Jid,
        include_last_message: bool,
    ) -> Result<Option<Chat>, StoreError>;

    /// Best-effort display name for a participant address.
    async fn sender_name(&self, jid: &Jid) -> Result<Option<String>, StoreError>;

    /// Matching messages in the query's order, paged.
    async fn search_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StoreError>;

    /// Look up a message by id.
    async fn message_by_id(&self, id: &str) -> Result<Option<Message>, StoreError>;

    /// Messages adjacent to `anchor` within its chat.
    async fn messages_around(
        &self,
        anchor: &Message,
        before: usize,
        after: usize,
    ) -> Result<MessageWindow, StoreError>;

    /// Matching chats in the query's order, paged.
    async fn list_chats(&self, query: &ChatQuery) -> Result<Vec<Chat>, StoreError>;

    /// Chats that are the participant's direct chat or contain a message
    /// from the participant, most recently active first.
    async fn chats_with_participant(
        &self,
        jid: &Jid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Chat>, StoreError>;

    /// Most recent message sent by the participant or in their direct chat.
    async fn last_interaction(&self, jid: &Jid) -> Result<Option<Message>, StoreError>;

    /// Non-group contacts whose name or address contains `query`.
    async fn search_contacts(&self, query: &str, limit: usize)
        -> Result<Vec<Contact>, StoreError>;

    /// Record counts.
    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}
