//! Typed arguments for the tools that do not share a type with the engine.
//!
//! `list_messages` and `list_chats` decode straight into
//! [`crate::query::ListMessagesArgs`] and [`crate::query::ListChatsArgs`].

use serde::Deserialize;

use super::ToolError;

fn yes() -> bool {
    true
}

/// `search_contacts`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchContactsArgs {
    /// Substring of a name or address.
    pub query: String,
}

/// `get_contact`, accepting the legacy `phone_number` name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactLookupArgs {
    /// Phone number, linked-id or address.
    #[serde(default)]
    pub identifier: Option<String>,
    /// Legacy name for `identifier`.
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl ContactLookupArgs {
    /// The identifier to resolve; `identifier` wins over `phone_number`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidInput`] when neither is given.
    pub fn identifier(self) -> Result<String, ToolError> {
        self.identifier
            .or(self.phone_number)
            .ok_or_else(|| ToolError::InvalidInput("missing required field: identifier".to_owned()))
    }
}

/// `get_chat`
#[derive(Debug, Clone, Deserialize)]
pub struct GetChatArgs {
    /// Chat address.
    pub chat_jid: String,
    /// Whether to fill last-message fields.
    #[serde(default = "yes")]
    pub include_last_message: bool,
}

/// `get_direct_chat_by_contact`
#[derive(Debug, Clone, Deserialize)]
pub struct DirectChatArgs {
    /// Contact identifier.
    pub sender_phone_number: String,
}

/// `get_contact_chats`
#[derive(Debug, Clone, Deserialize)]
pub struct ContactChatsArgs {
    /// Contact identifier.
    pub jid: String,
    /// Page size.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Zero-based page.
    #[serde(default)]
    pub page: usize,
}

/// `get_last_interaction`
#[derive(Debug, Clone, Deserialize)]
pub struct LastInteractionArgs {
    /// Contact identifier.
    pub jid: String,
}

/// `get_message_context`
#[derive(Debug, Clone, Deserialize)]
pub struct MessageContextArgs {
    /// Message id.
    pub message_id: String,
    /// Messages before.
    #[serde(default)]
    pub before: Option<usize>,
    /// Messages after.
    #[serde(default)]
    pub after: Option<usize>,
}

/// `send_message`
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageArgs {
    /// Phone number or address; checked by the relay.
    #[serde(default)]
    pub recipient: String,
    /// Text to send.
    pub message: String,
}

/// `send_file` and `send_audio_message`
#[derive(Debug, Clone, Deserialize)]
pub struct SendMediaArgs {
    /// Phone number or address; checked by the relay.
    #[serde(default)]
    pub recipient: String,
    /// Absolute path of the file.
    pub media_path: String,
}

/// `download_media`
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadMediaArgs {
    /// Message id.
    pub message_id: String,
    /// Chat the message belongs to.
    pub chat_jid: String,
}
