//! Configuration loading.
//!
//! Reads `config.toml` from `--config`, `$WHATSAPP_MCP_CONFIG`, or
//! `~/.whatsapp-mcp/config.toml`, in that order. A missing file means
//! defaults. Environment variables override file values.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::bridge::client::DEFAULT_BRIDGE_URL;
use crate::query::QueryLimits;

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "WHATSAPP_MCP_CONFIG";

/// Env var overriding `store.messages_db`.
pub const MESSAGES_DB_ENV: &str = "WHATSAPP_MCP_MESSAGES_DB";

/// Env var overriding `store.contacts_db`.
pub const CONTACTS_DB_ENV: &str = "WHATSAPP_MCP_CONTACTS_DB";

/// Env var overriding `bridge.base_url`.
pub const BRIDGE_URL_ENV: &str = "WHATSAPP_BRIDGE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bridge database locations.
    pub store: StoreConfig,
    /// Bridge HTTP API.
    pub bridge: BridgeConfig,
    /// Query caps and default page sizes.
    pub limits: QueryLimits,
    /// Log settings.
    pub logging: LoggingConfig,
}

/// `[store]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// The bridge's `messages.db`.
    pub messages_db: PathBuf,
    /// The bridge's `whatsapp.db`, used as an extra source of contact names.
    pub contacts_db: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            messages_db: PathBuf::from("../whatsapp-bridge/store/messages.db"),
            contacts_db: None,
        }
    }
}

/// `[bridge]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the bridge REST API.
    pub base_url: String,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BRIDGE_URL.to_owned(),
            connect_timeout_secs: 5,
            request_timeout_secs: 60,
        }
    }
}

impl BridgeConfig {
    /// Parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns an error unless the URL parses with an http(s) scheme.
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid bridge.base_url {:?}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("bridge.base_url must be http or https, got {}", url.scheme());
        }
        Ok(url)
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rotated JSON logs; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration with precedence env > file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the result fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match config_path(explicit, &env) {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(env);
        config.bridge.url()?;
        Ok(config)
    }

    /// Read a TOML file; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Parse a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or mistyped values.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment variable overrides.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env(MESSAGES_DB_ENV) {
            self.store.messages_db = PathBuf::from(v);
        }
        if let Some(v) = env(CONTACTS_DB_ENV) {
            self.store.contacts_db = Some(PathBuf::from(v));
        }
        if let Some(v) = env(BRIDGE_URL_ENV) {
            self.bridge.base_url = v;
        }
    }
}

/// The config file to read, if any can be determined.
fn config_path(
    explicit: Option<&Path>,
    env: &impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    if let Some(p) = env(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(p));
    }
    config_dir().ok().map(|d| d.join("config.toml"))
}

/// Resolve the default config directory (`~/.whatsapp-mcp/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".whatsapp-mcp"))
}
