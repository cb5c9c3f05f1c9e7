//! Tool surface: argument decoding, dispatch and JSON results.
//!
//! [`Toolbox::call`] maps a tool name and JSON arguments onto the query
//! engine or the command relay and returns the JSON value handed back to
//! the caller. Not-found results are `null`, `{}` or `[]`, never errors.

pub mod args;
pub mod definitions;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::bridge::BridgeError;
use crate::identity::IdentityError;
use crate::query::{ListChatsArgs, ListMessagesArgs, QueryEngine, QueryError};
use crate::relay::CommandRelay;

use self::args::{
    ContactChatsArgs, ContactLookupArgs, DirectChatArgs, DownloadMediaArgs, GetChatArgs,
    LastInteractionArgs, MessageContextArgs, SearchContactsArgs, SendMediaArgs, SendMessageArgs,
};
pub use self::definitions::{tool_definitions, ToolDefinition};

/// Errors from a tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No tool with this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The data source or bridge failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<QueryError> for ToolError {
    fn from(e: QueryError) -> Self {
        match &e {
            QueryError::InvalidTimestamp { .. }
            | QueryError::Identity(IdentityError::Empty(_) | IdentityError::InvalidAddress(_)) => {
                Self::InvalidInput(e.to_string())
            }
            QueryError::Identity(IdentityError::Store(_)) | QueryError::Store(_) => {
                Self::ExecutionFailed(e.to_string())
            }
        }
    }
}

impl From<BridgeError> for ToolError {
    fn from(e: BridgeError) -> Self {
        Self::ExecutionFailed(e.to_string())
    }
}

/// Decode tool arguments; absent arguments decode as `{}`.
fn decode<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
}

/// The query engine and command relay behind the tool names.
#[derive(Debug, Clone)]
pub struct Toolbox {
    engine: QueryEngine,
    relay: CommandRelay,
}

impl Toolbox {
    /// Assemble a toolbox.
    pub fn new(engine: QueryEngine, relay: CommandRelay) -> Self {
        Self { engine, relay }
    }

    /// Catalog of every tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Invoke a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for an unknown name,
    /// [`ToolError::InvalidInput`] for bad arguments and
    /// [`ToolError::ExecutionFailed`] when the data source or bridge fails.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        debug!(tool = name, "tool call");
        match name {
            "search_contacts" => {
                let a: SearchContactsArgs = decode(args)?;
                encode(&self.engine.search_contacts(&a.query).await?)
            }
            "get_contact" => {
                let identifier = decode::<ContactLookupArgs>(args)?.identifier()?;
                encode(&self.engine.get_contact(&identifier).await?)
            }
            "list_messages" => {
                let a: ListMessagesArgs = decode(args)?;
                encode(&self.engine.list_messages(&a).await?)
            }
            "list_chats" => {
                let a: ListChatsArgs = decode(args)?;
                encode(&self.engine.list_chats(&a).await?)
            }
            "get_chat" => {
                let a: GetChatArgs = decode(args)?;
                encode(&self.engine.get_chat(&a.chat_jid, a.include_last_message).await?)
            }
            "get_direct_chat_by_contact" => {
                let a: DirectChatArgs = decode(args)?;
                encode(
                    &self
                        .engine
                        .get_direct_chat_by_contact(&a.sender_phone_number)
                        .await?,
                )
            }
            "get_contact_chats" => {
                let a: ContactChatsArgs = decode(args)?;
                encode(&self.engine.get_contact_chats(&a.jid, a.limit, a.page).await?)
            }
            "get_last_interaction" => {
                let a: LastInteractionArgs = decode(args)?;
                match self.engine.get_last_interaction(&a.jid).await? {
                    Some(record) => encode(&record),
                    None => Ok(json!({})),
                }
            }
            "get_message_context" => {
                let a: MessageContextArgs = decode(args)?;
                encode(
                    &self
                        .engine
                        .get_message_context(&a.message_id, a.before, a.after)
                        .await?,
                )
            }
            "send_message" => {
                let a: SendMessageArgs = decode(args)?;
                encode(&self.relay.send_message(&a.recipient, &a.message).await?)
            }
            "send_file" => {
                let a: SendMediaArgs = decode(args)?;
                encode(&self.relay.send_file(&a.recipient, &a.media_path).await?)
            }
            "send_audio_message" => {
                let a: SendMediaArgs = decode(args)?;
                encode(
                    &self
                        .relay
                        .send_audio_message(&a.recipient, &a.media_path)
                        .await?,
                )
            }
            "download_media" => {
                let a: DownloadMediaArgs = decode(args)?;
                encode(&self.relay.download_media(&a.message_id, &a.chat_jid).await)
            }
            other => Err(ToolError::UnknownTool(other.to_owned())),
        }
    }
}
