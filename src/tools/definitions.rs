//! Tool catalog advertised by `tools/list`.

use serde::Serialize;
use serde_json::json;

/// Name, description and input schema of one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name used in `tools/call`.
    pub name: String,
    /// Description shown to the calling agent.
    pub description: String,
    /// JSON Schema object for the arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

fn tool(name: &str, description: &str, input_schema: serde_json::Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_owned(),
        description: description.to_owned(),
        input_schema,
    }
}

const RECIPIENT_DESCRIPTION: &str = "Phone number with country code and no symbols, or a JID \
     (e.g. \"123456789@s.whatsapp.net\" or a group JID like \"123456789@g.us\").";

/// Every tool the server exposes.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "search_contacts",
            "Search WhatsApp contacts by name or phone number.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search term matched against contact names or phone numbers."
                    }
                },
                "required": ["query"]
            }),
        ),
        tool(
            "get_contact",
            "Resolve a phone number, linked-id or JID to a contact name.",
            json!({
                "type": "object",
                "properties": {
                    "identifier": {
                        "type": "string",
                        "description": "Phone number, linked-id or full JID, e.g. \"12025551234\", \"184125298348272@lid\"."
                    },
                    "phone_number": {
                        "type": "string",
                        "description": "Deprecated alias for identifier."
                    }
                }
            }),
        ),
        tool(
            "list_messages",
            "Get WhatsApp messages matching the given criteria, optionally with surrounding context. \
             Each message includes sender_display showing \"Name (phone)\".",
            json!({
                "type": "object",
                "properties": {
                    "after": {
                        "type": "string",
                        "description": "ISO-8601 lower bound, inclusive (e.g. \"2026-01-01\" or \"2026-01-01T09:00:00\")."
                    },
                    "before": {
                        "type": "string",
                        "description": "ISO-8601 upper bound, exclusive."
                    },
                    "sender_phone_number": {
                        "type": "string",
                        "description": "Only messages from this sender (phone number, linked-id or JID)."
                    },
                    "chat_jid": {
                        "type": "string",
                        "description": "Only messages in this chat."
                    },
                    "query": {
                        "type": "string",
                        "description": "Case-insensitive substring of the message content."
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum matches to return (default 50, max 500).",
                        "minimum": 0
                    },
                    "page": {
                        "type": "integer",
                        "description": "Zero-based page number.",
                        "default": 0,
                        "minimum": 0
                    },
                    "include_context": {
                        "type": "boolean",
                        "description": "Include surrounding messages for each match.",
                        "default": true
                    },
                    "context_before": {
                        "type": "integer",
                        "description": "Messages to include before each match.",
                        "default": 1,
                        "minimum": 0
                    },
                    "context_after": {
                        "type": "integer",
                        "description": "Messages to include after each match.",
                        "default": 1,
                        "minimum": 0
                    },
                    "sort_by": {
                        "type": "string",
                        "enum": ["newest", "oldest"],
                        "default": "newest"
                    }
                }
            }),
        ),
        tool(
            "list_chats",
            "Get WhatsApp chats matching the given criteria.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Substring of the chat name or JID."
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum chats to return (default 50, max 200).",
                        "minimum": 0
                    },
                    "page": {
                        "type": "integer",
                        "default": 0,
                        "minimum": 0
                    },
                    "include_last_message": {
                        "type": "boolean",
                        "default": true
                    },
                    "sort_by": {
                        "type": "string",
                        "enum": ["last_active", "name"],
                        "default": "last_active"
                    }
                }
            }),
        ),
        tool(
            "get_chat",
            "Get WhatsApp chat metadata by JID.",
            json!({
                "type": "object",
                "properties": {
                    "chat_jid": { "type": "string" },
                    "include_last_message": { "type": "boolean", "default": true }
                },
                "required": ["chat_jid"]
            }),
        ),
        tool(
            "get_direct_chat_by_contact",
            "Get the direct chat with a contact by phone number.",
            json!({
                "type": "object",
                "properties": {
                    "sender_phone_number": { "type": "string" }
                },
                "required": ["sender_phone_number"]
            }),
        ),
        tool(
            "get_contact_chats",
            "Get all WhatsApp chats involving the contact.",
            json!({
                "type": "object",
                "properties": {
                    "jid": { "type": "string", "description": "The contact's JID or phone number." },
                    "limit": { "type": "integer", "default": 20, "minimum": 0 },
                    "page": { "type": "integer", "default": 0, "minimum": 0 }
                },
                "required": ["jid"]
            }),
        ),
        tool(
            "get_last_interaction",
            "Get the most recent WhatsApp message involving the contact. Returns {} when there is none.",
            json!({
                "type": "object",
                "properties": {
                    "jid": { "type": "string" }
                },
                "required": ["jid"]
            }),
        ),
        tool(
            "get_message_context",
            "Get the messages around a specific WhatsApp message.",
            json!({
                "type": "object",
                "properties": {
                    "message_id": { "type": "string" },
                    "before": { "type": "integer", "default": 5, "minimum": 0 },
                    "after": { "type": "integer", "default": 5, "minimum": 0 }
                },
                "required": ["message_id"]
            }),
        ),
        tool(
            "send_message",
            "Send a WhatsApp message to a person or group. For group chats use the JID.",
            json!({
                "type": "object",
                "properties": {
                    "recipient": { "type": "string", "description": RECIPIENT_DESCRIPTION },
                    "message": { "type": "string", "description": "The message text." }
                },
                "required": ["recipient", "message"]
            }),
        ),
        tool(
            "send_file",
            "Send a picture, video, document or raw audio file via WhatsApp.",
            json!({
                "type": "object",
                "properties": {
                    "recipient": { "type": "string", "description": RECIPIENT_DESCRIPTION },
                    "media_path": { "type": "string", "description": "Absolute path of the file." }
                },
                "required": ["recipient", "media_path"]
            }),
        ),
        tool(
            "send_audio_message",
            "Send an Opus .ogg file as a WhatsApp voice message. Use send_file for other audio formats.",
            json!({
                "type": "object",
                "properties": {
                    "recipient": { "type": "string", "description": RECIPIENT_DESCRIPTION },
                    "media_path": { "type": "string", "description": "Absolute path of the .ogg file." }
                },
                "required": ["recipient", "media_path"]
            }),
        ),
        tool(
            "download_media",
            "Download the media of a WhatsApp message and return the local file path.",
            json!({
                "type": "object",
                "properties": {
                    "message_id": { "type": "string" },
                    "chat_jid": { "type": "string" }
                },
                "required": ["message_id", "chat_jid"]
            }),
        ),
    ]
}
