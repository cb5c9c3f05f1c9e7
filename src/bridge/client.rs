//! HTTP client for the WhatsApp bridge.
//!
//! The bridge exposes `POST {base}/send` and `POST {base}/download`, both
//! answering with a `{success, message, ...}` JSON body.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{Bridge, BridgeError, BridgeReply};

/// Default bridge API base URL.
pub const DEFAULT_BRIDGE_URL: &str = "http://localhost:8080/api";

/// Client for the bridge HTTP API.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
}

/// Body of a `/download` response.
#[derive(Deserialize)]
struct DownloadResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    path: Option<String>,
}

impl BridgeClient {
    /// Create a client for the given base URL with connect and request timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &Url,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
        })
    }

    /// Returns the base URL of the bridge API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Whether anything answers at the base URL. Any HTTP status counts.
    pub async fn probe(&self) -> bool {
        match self.client.get(&self.base_url).send().await {
            Ok(resp) => {
                debug!(status = %resp.status(), "bridge probe answered");
                true
            }
            Err(e) => {
                debug!(error = %e, "bridge probe failed");
                false
            }
        }
    }

    async fn post_send(&self, body: serde_json::Value) -> Result<BridgeReply, BridgeError> {
        let resp = self
            .client
            .post(self.endpoint("send"))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(%status, "bridge send failed: {text}");
            return Ok(BridgeReply::failure(format!(
                "Error: HTTP {} - {text}",
                status.as_u16()
            )));
        }
        serde_json::from_str(&text).map_err(|_| BridgeError::BadResponse(text))
    }
}

/// True when the path names an existing regular file.
async fn is_file(path: &str) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// True for `.ogg` paths, compared case-insensitively.
fn is_ogg(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ogg"))
}

fn file_not_found(path: &str) -> BridgeReply {
    BridgeReply::failure(format!("Error: File not found: {path}"))
}

#[async_trait]
impl Bridge for BridgeClient {
    async fn send_message(
        &self,
        recipient: &str,
        message: &str,
    ) -> Result<BridgeReply, BridgeError> {
        debug!(recipient, "sending text via bridge");
        self.post_send(json!({ "recipient": recipient, "message": message }))
            .await
    }

    async fn send_file(
        &self,
        recipient: &str,
        media_path: &str,
    ) -> Result<BridgeReply, BridgeError> {
        if !is_file(media_path).await {
            return Ok(file_not_found(media_path));
        }
        debug!(recipient, media_path, "sending file via bridge");
        self.post_send(json!({ "recipient": recipient, "media_path": media_path }))
            .await
    }

    async fn send_audio(
        &self,
        recipient: &str,
        media_path: &str,
    ) -> Result<BridgeReply, BridgeError> {
        if !is_file(media_path).await {
            return Ok(file_not_found(media_path));
        }
        if !is_ogg(media_path) {
            return Ok(BridgeReply::failure(
                "Error: voice messages must be Opus .ogg files; use send_file for other audio formats",
            ));
        }
        debug!(recipient, media_path, "sending voice message via bridge");
        self.post_send(json!({ "recipient": recipient, "media_path": media_path }))
            .await
    }

    async fn download_media(
        &self,
        message_id: &str,
        chat_jid: &str,
    ) -> Result<Option<String>, BridgeError> {
        let resp = self
            .client
            .post(self.endpoint("download"))
            .json(&json!({ "message_id": message_id, "chat_jid": chat_jid }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, message_id, "bridge download failed: {text}");
            return Ok(None);
        }
        let text = resp.text().await?;
        let body: DownloadResponse =
            serde_json::from_str(&text).map_err(|_| BridgeError::BadResponse(text))?;
        if !body.success {
            warn!(message_id, "bridge refused download: {}", body.message);
            return Ok(None);
        }
        Ok(body.path.filter(|p| !p.is_empty()))
    }
}
