//! `whatsapp-mcp` entry point.
//!
//! Provides `serve` (default), `tools` and `status` subcommands for running
//! the stdio MCP server, printing the tool catalog, or checking the bridge
//! and its store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::BufReader;
use tracing::{info, warn};

use whatsapp_mcp::bridge::client::BridgeClient;
use whatsapp_mcp::config::Config;
use whatsapp_mcp::logging::{self, LoggingGuard};
use whatsapp_mcp::mcp::McpServer;
use whatsapp_mcp::query::QueryEngine;
use whatsapp_mcp::relay::CommandRelay;
use whatsapp_mcp::store::sqlite::SqliteStore;
use whatsapp_mcp::store::MessageStore;
use whatsapp_mcp::tools::{tool_definitions, Toolbox};

/// WhatsApp MCP server backed by a whatsmeow bridge.
#[derive(Parser)]
#[command(name = "whatsapp-mcp", version, about)]
struct Cli {
    /// Path to config.toml (default: ~/.whatsapp-mcp/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute (default: serve).
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Serve the tools over stdio JSON-RPC.
    Serve,
    /// Print the tool catalog as JSON.
    Tools,
    /// Report bridge reachability and store record counts.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = Config::load(cli.config.as_deref())
                .context("failed to load configuration")?;
            handle_serve(config).await
        }
        Command::Tools => handle_tools(),
        Command::Status => {
            let config = Config::load(cli.config.as_deref())
                .context("failed to load configuration")?;
            logging::init_cli(&config.logging.level);
            handle_status(&config).await
        }
    }
}

fn init_serve_logging(config: &Config) -> anyhow::Result<Option<LoggingGuard>> {
    match &config.logging.log_dir {
        Some(dir) => Ok(Some(logging::init_production(dir, &config.logging.level)?)),
        None => {
            logging::init_cli(&config.logging.level);
            Ok(None)
        }
    }
}

async fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    SqliteStore::connect(&config.store.messages_db, config.store.contacts_db.as_deref())
        .await
        .with_context(|| {
            format!(
                "failed to open bridge store {}",
                config.store.messages_db.display()
            )
        })
}

fn open_bridge(config: &Config) -> anyhow::Result<BridgeClient> {
    BridgeClient::new(
        &config.bridge.url()?,
        config.bridge.connect_timeout(),
        config.bridge.request_timeout(),
    )
    .context("failed to build bridge HTTP client")
}

/// Run the stdio server until stdin closes or a signal arrives.
///
/// On SIGINT/SIGTERM the process exits at once. In-flight requests are not
/// drained and no response is written for them.
async fn handle_serve(config: Config) -> anyhow::Result<()> {
    let guard = init_serve_logging(&config)?;

    let store: Arc<dyn MessageStore> = Arc::new(open_store(&config).await?);
    let bridge = Arc::new(open_bridge(&config)?);
    info!(
        messages_db = %config.store.messages_db.display(),
        bridge = bridge.base_url(),
        "starting whatsapp-mcp"
    );

    let toolbox = Toolbox::new(
        QueryEngine::new(store, config.limits),
        CommandRelay::new(bridge),
    );
    let server = McpServer::new(toolbox);

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tokio::select! {
        result = server.serve(stdin, stdout) => {
            result.context("stdio transport failed")?;
        }
        () = shutdown_signal() => {
            info!("shutdown signal received, exiting without draining requests");
            drop(guard);
            std::process::exit(0);
        }
    }
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Print the tool catalog.
fn handle_tools() -> anyhow::Result<()> {
    let catalog = serde_json::to_string_pretty(&tool_definitions())?;
    println!("{catalog}");
    Ok(())
}

/// Print bridge reachability and store counts as JSON.
async fn handle_status(config: &Config) -> anyhow::Result<()> {
    let bridge = open_bridge(config)?;
    let reachable = bridge.probe().await;

    let store = match open_store(config).await {
        Ok(store) => match store.counts().await {
            Ok(counts) => json!({
                "messages_db": config.store.messages_db.display().to_string(),
                "chats": counts.chats,
                "messages": counts.messages,
            }),
            Err(e) => json!({
                "messages_db": config.store.messages_db.display().to_string(),
                "error": e.to_string(),
            }),
        },
        Err(e) => json!({
            "messages_db": config.store.messages_db.display().to_string(),
            "error": format!("{e:#}"),
        }),
    };

    let report = json!({
        "bridge": { "url": bridge.base_url(), "reachable": reachable },
        "store": store,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
