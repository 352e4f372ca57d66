//! Client configuration for the bot-link login flow.
//!
//! This module handles loading and saving the configuration, which holds
//! the three auth endpoint URLs, the bot username and the renewal policy.
//!
//! Configuration is stored at `~/.config/tglogin/config.json`; any field
//! can be overridden from `TGLOGIN_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::REQUEST_TIMEOUT_SECS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tglogin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Host serving bot deep links
pub const DEFAULT_MESSAGING_DOMAIN: &str = "t.me";

/// Renew this many seconds before the access token expires.
pub const DEFAULT_REFRESH_BEFORE_EXPIRY_SECS: u64 = 60;

/// Endpoints of the auth backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUrls {
    pub callback: String,
    pub refresh: String,
    pub logout: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_urls: ApiUrls,
    /// Bot username, without the leading `@`
    pub bot_username: String,
    pub messaging_domain: String,
    /// Renew the access token in the background before it expires
    pub auto_refresh: bool,
    /// Seconds before expiry at which the renewal fires
    pub refresh_before_expiry: u64,
    pub request_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_urls: ApiUrls::default(),
            bot_username: String::new(),
            messaging_domain: DEFAULT_MESSAGING_DOMAIN.to_string(),
            auto_refresh: true,
            refresh_before_expiry: DEFAULT_REFRESH_BEFORE_EXPIRY_SECS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AuthConfig {
    pub fn new(api_urls: ApiUrls, bot_username: impl Into<String>) -> Self {
        Self {
            api_urls,
            bot_username: bot_username.into(),
            ..Self::default()
        }
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn with_refresh_before_expiry(mut self, secs: u64) -> Self {
        self.refresh_before_expiry = secs;
        self
    }

    pub fn with_messaging_domain(mut self, domain: impl Into<String>) -> Self {
        self.messaging_domain = domain.into();
        self
    }

    /// Load from the default config path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from `TGLOGIN_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = var("TGLOGIN_CALLBACK_URL") {
            self.api_urls.callback = v;
        }
        if let Some(v) = var("TGLOGIN_REFRESH_URL") {
            self.api_urls.refresh = v;
        }
        if let Some(v) = var("TGLOGIN_LOGOUT_URL") {
            self.api_urls.logout = v;
        }
        if let Some(v) = var("TGLOGIN_BOT_USERNAME") {
            self.bot_username = v;
        }
        if let Some(v) = var("TGLOGIN_MESSAGING_DOMAIN") {
            self.messaging_domain = v;
        }
        if let Some(v) = var("TGLOGIN_AUTO_REFRESH") {
            self.auto_refresh = parse_flag(&v)
                .with_context(|| format!("TGLOGIN_AUTO_REFRESH: not a boolean: {v}"))?;
        }
        if let Some(v) = var("TGLOGIN_REFRESH_BEFORE_EXPIRY") {
            self.refresh_before_expiry = v
                .trim()
                .parse()
                .with_context(|| format!("TGLOGIN_REFRESH_BEFORE_EXPIRY: not a number: {v}"))?;
        }
        if let Some(v) = var("TGLOGIN_REQUEST_TIMEOUT") {
            self.request_timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("TGLOGIN_REQUEST_TIMEOUT: not a number: {v}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("callback", &self.api_urls.callback),
            ("refresh", &self.api_urls.refresh),
            ("logout", &self.api_urls.logout),
        ];
        for (name, url) in urls {
            if url.trim().is_empty() {
                bail!("No {name} URL configured");
            }
        }
        if self.bot_username().is_empty() {
            bail!("No bot username configured");
        }
        Ok(())
    }

    /// Bot username with any leading `@` removed
    pub fn bot_username(&self) -> &str {
        self.bot_username.trim().trim_start_matches('@')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
