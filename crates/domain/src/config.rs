//! Application configuration structures
//!
//! Loaded by `syndica-infra::config` from a TOML/JSON file or from
//! `SYNDICA_*` environment variables. Platform sections are optional;
//! only platforms with credentials present are registered at startup.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the scheduler process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyndicaConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default)]
    pub platforms: PlatformsConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Outbound HTTP behavior shared by every publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Total attempts per call (initial try + retries).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    /// Backoff unit; attempt n waits `base * 2^(n-1)` before the next try.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            retry_attempts: default_retry_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

/// Per-platform credential sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    pub facebook: Option<FacebookConfig>,
    pub twitter: Option<TwitterConfig>,
    pub linkedin: Option<LinkedInConfig>,
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    pub access_token: String,
    pub page_id: String,
    #[serde(default = "default_facebook_api_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub bearer_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInConfig {
    pub access_token: String,
    /// URN of the member or organization posts are authored as.
    pub author_urn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api_base_url")]
    pub api_base_url: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_pool_size() -> u32 {
    4
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_retry_attempts() -> usize {
    3
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_facebook_api_version() -> String {
    "v20.0".to_string()
}

fn default_telegram_api_base_url() -> String {
    "https://api.telegram.org/bot".to_string()
}
