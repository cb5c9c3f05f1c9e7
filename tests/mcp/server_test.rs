//! JSON-RPC framing and method dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use whatsapp_mcp::bridge::{Bridge, BridgeError, BridgeReply};
use whatsapp_mcp::mcp::{McpServer, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION};
use whatsapp_mcp::model::{Chat, Jid};
use whatsapp_mcp::query::{QueryEngine, QueryLimits};
use whatsapp_mcp::relay::CommandRelay;
use whatsapp_mcp::store::memory::MemoryStore;
use whatsapp_mcp::tools::Toolbox;

/// Bridge that accepts every send and has no media.
struct AcceptingBridge;

#[async_trait]
impl Bridge for AcceptingBridge {
    async fn send_message(&self, recipient: &str, _: &str) -> Result<BridgeReply, BridgeError> {
        Ok(BridgeReply {
            success: true,
            message: format!("Message sent to {recipient}"),
        })
    }

    async fn send_file(&self, recipient: &str, _: &str) -> Result<BridgeReply, BridgeError> {
        self.send_message(recipient, "").await
    }

    async fn send_audio(&self, recipient: &str, _: &str) -> Result<BridgeReply, BridgeError> {
        self.send_message(recipient, "").await
    }

    async fn download_media(&self, _: &str, _: &str) -> Result<Option<String>, BridgeError> {
        Ok(None)
    }
}

async fn server() -> McpServer {
    let store = MemoryStore::new();
    store
        .insert_chat(Chat::new(
            Jid::from_raw("12025551234@s.whatsapp.net"),
            Some("John Doe".to_owned()),
        ))
        .await;
    let toolbox = Toolbox::new(
        QueryEngine::new(Arc::new(store), QueryLimits::default()),
        CommandRelay::new(Arc::new(AcceptingBridge)),
    );
    McpServer::new(toolbox)
}

async fn roundtrip(server: &McpServer, request: Value) -> Value {
    let frame = server
        .handle_line(&request.to_string())
        .await
        .expect("request should be answered");
    serde_json::from_str(&frame).expect("response should be JSON")
}

/// The JSON text inside a `tools/call` result.
fn tool_text(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

#[tokio::test]
async fn initialize_reports_protocol_and_capabilities() {
    let server = server().await;
    let response = roundtrip(
        &server,
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
    )
    .await;
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(response["result"]["serverInfo"]["name"], "whatsapp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn tools_list_returns_catalog() {
    let server = server().await;
    let response = roundtrip(
        &server,
        json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"}),
    )
    .await;
    let tools = response["result"]["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 13);
    assert!(tools
        .iter()
        .any(|t| t["name"] == "list_messages" && t["inputSchema"]["type"] == "object"));
}

#[tokio::test]
async fn tools_call_wraps_result_as_text() {
    let server = server().await;
    let response = roundtrip(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "get_contact", "arguments": {"identifier": "12025551234"}}
        }),
    )
    .await;
    assert_eq!(response["result"]["isError"], false);
    let contact = tool_text(&response);
    assert_eq!(contact["name"], "John Doe");
    assert_eq!(contact["resolved"], true);
}

#[tokio::test]
async fn tool_failures_are_results_not_protocol_errors() {
    let server = server().await;
    let response = roundtrip(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 8,
            "method": "tools/call",
            "params": {"name": "list_messages", "arguments": {"after": "not a date"}}
        }),
    )
    .await;
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);

    let unknown = roundtrip(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 9,
            "method": "tools/call",
            "params": {"name": "delete_everything"}
        }),
    )
    .await;
    assert_eq!(unknown["result"]["isError"], true);
    assert_eq!(tool_text(&unknown), json!("unknown tool: delete_everything"));
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let server = server().await;
    let response = roundtrip(
        &server,
        json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}),
    )
    .await;
    assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    assert_eq!(response["id"], 3);
}

#[tokio::test]
async fn malformed_json_is_a_parse_error() {
    let server = server().await;
    let frame = server
        .handle_line("{not json")
        .await
        .expect("parse errors are answered");
    let response: Value = serde_json::from_str(&frame).expect("JSON");
    assert_eq!(response["error"]["code"], PARSE_ERROR);
    assert!(response["id"].is_null());
}

#[tokio::test]
async fn notifications_and_blank_lines_get_no_reply() {
    let server = server().await;
    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    assert!(server.handle_line(&notification.to_string()).await.is_none());
    assert!(server.handle_line("   \n").await.is_none());
}

#[tokio::test]
async fn serve_answers_each_line_in_order() {
    let server = server().await;
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
        "\n",
    );
    let mut output: Vec<u8> = Vec::new();
    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("serve");

    let text = String::from_utf8(output).expect("utf-8");
    let ids: Vec<Value> = text
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).expect("JSON")["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(1), json!(2)]);
}
