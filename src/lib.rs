//! whatsapp-mcp: WhatsApp chats, contacts and messages as MCP tools.
//!
//! Reads the bridge's SQLite store for queries and relays send and download
//! commands to the bridge's HTTP API. Served over stdio JSON-RPC.
//!
//! Layers, bottom-up:
//! - [`model`]: addresses, records and their serialized shapes
//! - [`store`]: the read interface over the bridge's records
//! - [`identity`]: identifier → canonical address and display name
//! - [`query`]: filtering, paging and context windows
//! - [`bridge`] and [`relay`]: outbound commands
//! - [`tools`] and [`mcp`]: the tool surface and its transport

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod model;
pub mod store;

pub mod identity;
pub mod query;

pub mod bridge;
pub mod relay;

pub mod mcp;
pub mod tools;
