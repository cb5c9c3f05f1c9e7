//! Record model: messages, chats and contacts as read from the bridge store,
//! and the flat records returned to tool callers.
//!
//! Store-side types ([`Message`], [`Chat`], [`Contact`]) keep typed values.
//! Caller-side records ([`MessageRecord`], [`ChatRecord`], [`ContactRecord`])
//! carry the serialized shape: ISO-8601 strings and derived fields such as
//! `is_group` and `sender_display`.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use thiserror::Error;

/// Domain suffix of person-to-person addresses.
pub const DIRECT_DOMAIN: &str = "s.whatsapp.net";

/// Domain suffix of group addresses.
pub const GROUP_DOMAIN: &str = "g.us";

/// Domain suffix of linked-id addresses.
pub const LID_DOMAIN: &str = "lid";

/// Display name used for messages authored by the account owner.
pub const SELF_DISPLAY_NAME: &str = "Me";

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Errors from address parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JidError {
    /// The value does not have exactly one `@` between a non-empty
    /// local-part and a non-empty domain.
    #[error("malformed address: {0}")]
    Malformed(String),
}

/// The kind of an address, derived from its domain suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JidDomain {
    /// `s.whatsapp.net`
    Direct,
    /// `g.us`
    Group,
    /// `lid`
    Lid,
    /// Anything else the bridge may have stored (`broadcast`, `newsletter`, ...).
    Other(String),
}

impl JidDomain {
    /// Classify a domain suffix.
    pub fn from_suffix(suffix: &str) -> Self {
        match suffix {
            DIRECT_DOMAIN => Self::Direct,
            GROUP_DOMAIN => Self::Group,
            LID_DOMAIN => Self::Lid,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The domain suffix as written after `@`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Direct => DIRECT_DOMAIN,
            Self::Group => GROUP_DOMAIN,
            Self::Lid => LID_DOMAIN,
            Self::Other(s) => s,
        }
    }
}

/// A `local-part@domain` address for a chat or participant.
///
/// Values read from the store are wrapped as-is with [`Jid::from_raw`];
/// caller input goes through [`Jid::parse`], which checks the shape only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Wrap a stored value without validation.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build an address from a local-part and a domain kind.
    pub fn from_parts(user: &str, domain: &JidDomain) -> Self {
        Self(format!("{user}@{}", domain.as_str()))
    }

    /// Parse a caller-supplied address.
    ///
    /// # Errors
    ///
    /// Returns [`JidError::Malformed`] unless the value has exactly one `@`
    /// with a non-empty local-part and a non-empty domain. Any domain is kept
    /// verbatim; unfamiliar ones classify as [`JidDomain::Other`].
    pub fn parse(raw: &str) -> Result<Self, JidError> {
        let trimmed = raw.trim();
        let (user, domain) = trimmed
            .split_once('@')
            .ok_or_else(|| JidError::Malformed(raw.to_owned()))?;
        if user.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(JidError::Malformed(raw.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The full address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The local-part before `@` (the whole value when there is no `@`).
    pub fn user(&self) -> &str {
        local_part(&self.0)
    }

    /// The domain kind after `@`.
    pub fn domain(&self) -> JidDomain {
        match self.0.split_once('@') {
            Some((_, suffix)) => JidDomain::from_suffix(suffix),
            None => JidDomain::Other(String::new()),
        }
    }

    /// True iff the domain is `g.us`.
    pub fn is_group(&self) -> bool {
        self.domain() == JidDomain::Group
    }

    /// True iff the domain is `lid`.
    pub fn is_lid(&self) -> bool {
        self.domain() == JidDomain::Lid
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The part of an address before `@`.
pub fn local_part(address: &str) -> &str {
    address.split_once('@').map_or(address, |(user, _)| user)
}

/// Address of a message sender.
///
/// The bridge stores senders either fully qualified or as a bare local-part;
/// bare values are direct addresses.
pub fn sender_jid(sender: &str) -> Jid {
    if sender.contains('@') {
        Jid::from_raw(sender)
    } else {
        Jid::from_parts(sender, &JidDomain::Direct)
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Format a naive timestamp as ISO-8601 without a timezone suffix.
///
/// Sub-second precision is emitted as microseconds only when non-zero.
pub fn iso_timestamp(ts: &NaiveDateTime) -> String {
    let base = ts.format("%Y-%m-%dT%H:%M:%S").to_string();
    let micros = ts.nanosecond() / 1_000;
    if micros == 0 {
        base
    } else {
        format!("{base}.{micros:06}")
    }
}

/// Parse a timestamp as written by the bridge or supplied by a caller.
///
/// Accepts a bare date (midnight), `T`- or space-separated date-times with
/// optional fractional seconds, and either of those with a UTC offset. Offsets
/// are dropped and the wall-clock time is kept.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ---------------------------------------------------------------------------
// Store-side records
// ---------------------------------------------------------------------------

/// A single message as stored by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Bridge-assigned message id (unique within its chat).
    pub id: String,
    /// Send time, naive wall clock.
    pub timestamp: NaiveDateTime,
    /// Sender address, fully qualified or bare local-part.
    pub sender: String,
    /// Text content (empty for pure media messages).
    pub content: String,
    /// Whether the account owner sent this message.
    pub is_from_me: bool,
    /// Chat the message belongs to.
    pub chat_jid: Jid,
    /// Chat display name, if known.
    pub chat_name: Option<String>,
    /// Media kind (`image`, `video`, `audio`, `document`), if any.
    pub media_type: Option<String>,
}

impl Message {
    /// Key identifying the message across chats.
    pub fn key(&self) -> (String, String) {
        (self.id.clone(), self.chat_jid.as_str().to_owned())
    }

    /// Chronological sort key with the id as tie-break.
    pub fn chrono_key(&self) -> (NaiveDateTime, &str) {
        (self.timestamp, self.id.as_str())
    }
}

/// A chat as stored by the bridge, optionally with its last message.
#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    /// Chat address.
    pub jid: Jid,
    /// Display name, if known.
    pub name: Option<String>,
    /// Time of the most recent message.
    pub last_message_time: Option<NaiveDateTime>,
    /// Content of the most recent message.
    pub last_message: Option<String>,
    /// Sender of the most recent message.
    pub last_sender: Option<String>,
    /// Whether the most recent message was sent by the account owner.
    pub last_is_from_me: Option<bool>,
}

impl Chat {
    /// Metadata-only chat with no last-message fields.
    pub fn new(jid: Jid, name: Option<String>) -> Self {
        Self {
            jid,
            name,
            last_message_time: None,
            last_message: None,
            last_sender: None,
            last_is_from_me: None,
        }
    }

    /// Derived from the address domain.
    pub fn is_group(&self) -> bool {
        self.jid.is_group()
    }

    /// Drop the last-message content fields, keeping `last_message_time`.
    pub fn without_last_message(mut self) -> Self {
        self.last_message = None;
        self.last_sender = None;
        self.last_is_from_me = None;
        self
    }
}

/// A contact known to the account.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// Phone number, absent for linked-id contacts.
    pub phone_number: Option<String>,
    /// Display name, if known.
    pub name: Option<String>,
    /// Contact address.
    pub jid: Jid,
}

impl Contact {
    /// Build a contact, deriving the phone number from a direct address.
    pub fn from_jid(jid: Jid, name: Option<String>) -> Self {
        let phone_number = (jid.domain() == JidDomain::Direct).then(|| jid.user().to_owned());
        Self {
            phone_number,
            name,
            jid,
        }
    }
}

// ---------------------------------------------------------------------------
// Caller-side records
// ---------------------------------------------------------------------------

/// Serialized message returned by message tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    /// Message id.
    pub id: String,
    /// ISO-8601 send time.
    pub timestamp: String,
    /// Sender address as stored.
    pub sender_jid: String,
    /// Sender local-part.
    pub sender_phone: String,
    /// Resolved sender name, `"Me"` for self-authored messages.
    pub sender_name: Option<String>,
    /// `"Name (phone)"`, the bare phone, or `"Me"`.
    pub sender_display: String,
    /// Text content.
    pub content: String,
    /// Whether the account owner sent this message.
    pub is_from_me: bool,
    /// Chat address.
    pub chat_jid: String,
    /// Chat display name.
    pub chat_name: Option<String>,
    /// Media kind, if any.
    pub media_type: Option<String>,
    /// True when included only as context around a match.
    pub is_context: bool,
}

impl MessageRecord {
    /// Serialize a message with an optionally resolved sender name.
    ///
    /// A name equal to the sender's local-part is treated as unresolved.
    pub fn from_message(msg: &Message, sender_name: Option<&str>) -> Self {
        let sender_phone = local_part(&msg.sender).to_owned();
        let (sender_name, sender_display) = if msg.is_from_me {
            (
                Some(SELF_DISPLAY_NAME.to_owned()),
                SELF_DISPLAY_NAME.to_owned(),
            )
        } else {
            match sender_name.filter(|n| !n.is_empty() && *n != sender_phone) {
                Some(name) => (Some(name.to_owned()), format!("{name} ({sender_phone})")),
                None => (None, sender_phone.clone()),
            }
        };
        Self {
            id: msg.id.clone(),
            timestamp: iso_timestamp(&msg.timestamp),
            sender_jid: msg.sender.clone(),
            sender_phone,
            sender_name,
            sender_display,
            content: msg.content.clone(),
            is_from_me: msg.is_from_me,
            chat_jid: msg.chat_jid.as_str().to_owned(),
            chat_name: msg.chat_name.clone(),
            media_type: msg.media_type.clone(),
            is_context: false,
        }
    }

    /// Mark this record as context decoration.
    pub fn as_context(mut self) -> Self {
        self.is_context = true;
        self
    }
}

/// Serialized chat returned by chat tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRecord {
    /// Chat address.
    pub jid: String,
    /// Display name.
    pub name: Option<String>,
    /// Derived from the address domain.
    pub is_group: bool,
    /// ISO-8601 time of the last message.
    pub last_message_time: Option<String>,
    /// Last message content.
    pub last_message: Option<String>,
    /// Last message sender.
    pub last_sender: Option<String>,
    /// Whether the last message was self-authored.
    pub last_is_from_me: Option<bool>,
}

impl From<&Chat> for ChatRecord {
    fn from(chat: &Chat) -> Self {
        Self {
            jid: chat.jid.as_str().to_owned(),
            name: chat.name.clone(),
            is_group: chat.is_group(),
            last_message_time: chat.last_message_time.as_ref().map(iso_timestamp),
            last_message: chat.last_message.clone(),
            last_sender: chat.last_sender.clone(),
            last_is_from_me: chat.last_is_from_me,
        }
    }
}

/// Serialized contact returned by contact tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRecord {
    /// Phone number, if any.
    pub phone_number: Option<String>,
    /// Display name, if any.
    pub name: Option<String>,
    /// Contact address.
    pub jid: String,
}

impl From<&Contact> for ContactRecord {
    fn from(contact: &Contact) -> Self {
        Self {
            phone_number: contact.phone_number.clone(),
            name: contact.name.clone(),
            jid: contact.jid.as_str().to_owned(),
        }
    }
}
