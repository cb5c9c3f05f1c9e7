//! Outbound side: the bridge that sends messages and downloads media.
//!
//! [`Bridge`] is the command interface the relay consumes.
//! [`client::BridgeClient`] speaks the bridge's HTTP API.

pub mod client;

use async_trait::async_trait;
use serde::Deserialize;

/// Errors from the bridge transport.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// HTTP request to the bridge failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with a body that could not be interpreted.
    #[error("unexpected bridge response: {0}")]
    BadResponse(String),
}

/// The bridge's verdict on a send, relayed to callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeReply {
    /// Whether the bridge accepted the message.
    pub success: bool,
    /// Bridge status text.
    #[serde(default)]
    pub message: String,
}

impl BridgeReply {
    /// A failed reply with the given text.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Commands the relay forwards to the bridge.
///
/// Recipients are passed through unresolved; the bridge resolves them.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Send a text message.
    async fn send_message(&self, recipient: &str, message: &str)
        -> Result<BridgeReply, BridgeError>;

    /// Send a file (image, video, document, raw audio).
    async fn send_file(&self, recipient: &str, media_path: &str)
        -> Result<BridgeReply, BridgeError>;

    /// Send an audio file as a voice message.
    async fn send_audio(&self, recipient: &str, media_path: &str)
        -> Result<BridgeReply, BridgeError>;

    /// Download a message's media, returning the local path when it succeeds.
    async fn download_media(
        &self,
        message_id: &str,
        chat_jid: &str,
    ) -> Result<Option<String>, BridgeError>;
}
