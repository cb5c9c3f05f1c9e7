//! Command relay: send and download actions with a uniform response shape.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::bridge::{Bridge, BridgeError, BridgeReply};

/// Reply when a send is attempted without a recipient.
pub const MISSING_RECIPIENT: &str = "Recipient must be provided";

/// Reply when a download produced a file.
pub const DOWNLOAD_OK: &str = "Media downloaded successfully";

/// Reply when a download produced no file.
pub const DOWNLOAD_FAILED: &str = "Failed to download media";

/// `{success, message, file_path?}` returned by every relay command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayResponse {
    /// Whether the action succeeded.
    pub success: bool,
    /// Status text.
    pub message: String,
    /// Local path of a downloaded file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl RelayResponse {
    fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_owned(),
            file_path: None,
        }
    }
}

impl From<BridgeReply> for RelayResponse {
    fn from(reply: BridgeReply) -> Self {
        Self {
            success: reply.success,
            message: reply.message,
            file_path: None,
        }
    }
}

/// Forwards commands to a [`Bridge`].
#[derive(Clone)]
pub struct CommandRelay {
    bridge: Arc<dyn Bridge>,
}

impl std::fmt::Debug for CommandRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRelay").finish_non_exhaustive()
    }
}

fn missing(recipient: &str) -> bool {
    recipient.trim().is_empty()
}

impl CommandRelay {
    /// Create a relay over the given bridge.
    pub fn new(bridge: Arc<dyn Bridge>) -> Self {
        Self { bridge }
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] if the bridge cannot be reached.
    pub async fn send_message(
        &self,
        recipient: &str,
        message: &str,
    ) -> Result<RelayResponse, BridgeError> {
        if missing(recipient) {
            return Ok(RelayResponse::failure(MISSING_RECIPIENT));
        }
        Ok(self.bridge.send_message(recipient, message).await?.into())
    }

    /// Send a file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] if the bridge cannot be reached.
    pub async fn send_file(
        &self,
        recipient: &str,
        media_path: &str,
    ) -> Result<RelayResponse, BridgeError> {
        if missing(recipient) {
            return Ok(RelayResponse::failure(MISSING_RECIPIENT));
        }
        Ok(self.bridge.send_file(recipient, media_path).await?.into())
    }

    /// Send an audio file as a voice message.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] if the bridge cannot be reached.
    pub async fn send_audio_message(
        &self,
        recipient: &str,
        media_path: &str,
    ) -> Result<RelayResponse, BridgeError> {
        if missing(recipient) {
            return Ok(RelayResponse::failure(MISSING_RECIPIENT));
        }
        Ok(self.bridge.send_audio(recipient, media_path).await?.into())
    }

    /// Download a message's media. Every failure becomes a failed response.
    pub async fn download_media(&self, message_id: &str, chat_jid: &str) -> RelayResponse {
        match self.bridge.download_media(message_id, chat_jid).await {
            Ok(Some(path)) => {
                debug!(message_id, path = %path, "media downloaded");
                RelayResponse {
                    success: true,
                    message: DOWNLOAD_OK.to_owned(),
                    file_path: Some(path),
                }
            }
            Ok(None) => RelayResponse::failure(DOWNLOAD_FAILED),
            Err(e) => {
                warn!(error = %e, message_id, "media download failed");
                RelayResponse::failure(DOWNLOAD_FAILED)
            }
        }
    }
}
