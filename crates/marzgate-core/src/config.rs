//! Client configuration management.
//!
//! Holds the panel address, admin credentials, and the token TTL and
//! request timeout assumed by the client.
//!
//! Configuration is read from `~/.config/marzgate/config.json` when present,
//! then overridden by `MARZBAN_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_TOKEN_TTL_SECS;

/// Application name used for the config directory path
const APP_NAME: &str = "marzgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Largest accepted token TTL: one year.
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_URL: &str = "MARZBAN_URL";
pub const ENV_USERNAME: &str = "MARZBAN_USERNAME";
pub const ENV_PASSWORD: &str = "MARZBAN_PASSWORD";
pub const ENV_TOKEN_TTL: &str = "MARZBAN_TOKEN_TTL_SECS";
pub const ENV_TIMEOUT: &str = "MARZBAN_TIMEOUT_SECS";

#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_token_ttl() -> i64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
        .normalized()
    }

    /// Load the config file if it exists, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let base = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Some(
                serde_json::from_str::<ClientConfig>(&contents)
                    .with_context(|| format!("Failed to parse {}", path.display()))?,
            )
        } else {
            None
        };
        Self::from_lookup(base, |key| std::env::var(key).ok())
    }

    /// Build purely from `MARZBAN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(None, |key| std::env::var(key).ok())
    }

    fn from_lookup(base: Option<Self>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = base.unwrap_or_else(|| Self::new("", "", ""));

        if let Some(url) = lookup(ENV_URL) {
            config.base_url = url;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            config.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            config.password = password;
        }
        if let Some(ttl) = lookup(ENV_TOKEN_TTL) {
            config.token_ttl_secs = ttl
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TOKEN_TTL} must be an integer, got {ttl:?}"))?;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT) {
            config.request_timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT} must be an integer, got {timeout:?}"))?;
        }

        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("Panel URL is not set ({ENV_URL})");
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("Panel URL must start with http:// or https://: {}", self.base_url);
        }
        if self.username.is_empty() {
            anyhow::bail!("Admin username is not set ({ENV_USERNAME})");
        }
        if self.token_ttl_secs <= 0 || self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            anyhow::bail!(
                "Token TTL must be between 1 and {MAX_TOKEN_TTL_SECS} seconds, got {}",
                self.token_ttl_secs
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be positive");
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        self
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
