//! MCP JSON-RPC 2.0 server over stdin/stdout.
//!
//! One JSON object per line in each direction. Implements the `initialize`
//! handshake, `ping`, tool discovery (`tools/list`) and tool invocation
//! (`tools/call`). Requests are handled one at a time, in arrival order.
//!
//! stdout carries only protocol frames; logging goes to stderr.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::tools::Toolbox;

/// MCP protocol revision spoken by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported in `initialize`.
pub const SERVER_NAME: &str = "whatsapp";

/// JSON-RPC: invalid JSON.
pub const PARSE_ERROR: i64 = -32700;

/// JSON-RPC: not a request object.
pub const INVALID_REQUEST: i64 = -32600;

/// JSON-RPC: unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC: bad method parameters.
pub const INVALID_PARAMS: i64 = -32602;

// ── Wire types ──

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

// ── Server ──

/// Serves a [`Toolbox`] over newline-delimited JSON-RPC.
#[derive(Debug, Clone)]
pub struct McpServer {
    toolbox: Toolbox,
}

impl McpServer {
    /// Create a server for the given toolbox.
    pub fn new(toolbox: Toolbox) -> Self {
        Self { toolbox }
    }

    /// Read requests from `reader` and write responses to `writer` until EOF.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading or writing fails.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(protocol = PROTOCOL_VERSION, "MCP server listening on stdio");
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                info!("stdin closed, shutting down");
                return Ok(());
            }
            if let Some(response) = self.handle_line(&line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
    }

    /// Handle one input line, returning the response frame if one is due.
    ///
    /// Blank lines and notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let response = match serde_json::from_str::<Value>(trimmed) {
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {e}"),
            )),
            Ok(value) => self.handle_value(value).await,
        };
        let response = response?;
        match serde_json::to_string(&response) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "failed to encode response");
                None
            }
        }
    }

    async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        let fallback_id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    fallback_id,
                    INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                ))
            }
        };

        let Some(id) = request.id.filter(|id| !id.is_null()) else {
            debug!(method = %request.method, "notification");
            return None;
        };

        debug!(method = %request.method, "request");
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::result(id, initialize_result()),
            "ping" => JsonRpcResponse::result(id, json!({})),
            "tools/list" => {
                JsonRpcResponse::result(id, json!({ "tools": self.toolbox.definitions() }))
            }
            "tools/call" => self.tools_call(id, request.params).await,
            other => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    async fn tools_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: CallParams = match params.map(serde_json::from_value::<CallParams>) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}"))
            }
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Invalid params: missing"),
        };

        let (text, is_error) = match self.toolbox.call(&params.name, params.arguments).await {
            Ok(value) => match serde_json::to_string(&value) {
                Ok(text) => (text, false),
                Err(e) => (e.to_string(), true),
            },
            Err(e) => {
                warn!(tool = %params.name, error = %e, "tool call failed");
                (e.to_string(), true)
            }
        };
        JsonRpcResponse::result(
            id,
            json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error
            }),
        )
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}
