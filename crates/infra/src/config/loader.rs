//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports TOML and JSON formats
//!
//! ## Environment Variables
//! - `SYNDICA_DB_PATH`: Database file path (required for env loading)
//! - `SYNDICA_DB_POOL_SIZE`: Connection pool size
//! - `SYNDICA_DEFAULT_TIMEZONE`: Default IANA timezone name
//! - `SYNDICA_HTTP_TIMEOUT`: Per-call timeout in seconds
//! - `SYNDICA_HTTP_RETRY_ATTEMPTS`: Attempts per outbound call
//! - `SYNDICA_HTTP_BASE_BACKOFF_MS`: Backoff unit in milliseconds
//! - `SYNDICA_FACEBOOK_ACCESS_TOKEN` / `SYNDICA_FACEBOOK_PAGE_ID` /
//!   `SYNDICA_FACEBOOK_API_VERSION`
//! - `SYNDICA_TWITTER_BEARER_TOKEN`
//! - `SYNDICA_LINKEDIN_ACCESS_TOKEN` / `SYNDICA_LINKEDIN_AUTHOR_URN`
//! - `SYNDICA_TELEGRAM_BOT_TOKEN` / `SYNDICA_TELEGRAM_CHAT_ID` /
//!   `SYNDICA_TELEGRAM_API_BASE_URL`
//!
//! Platform sections are optional everywhere; a platform is registered only
//! when its required credentials are present.

use std::path::{Path, PathBuf};

use syndica_domain::{
    DatabaseConfig, FacebookConfig, HttpConfig, LinkedInConfig, PlatformsConfig, Result,
    SyndicaConfig, SyndicaError, TelegramConfig, TwitterConfig,
};

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `SyndicaError::Config` if neither source yields a valid
/// configuration.
pub fn load(path: Option<PathBuf>) -> Result<SyndicaConfig> {
    if let Some(path) = path {
        return load_from_file(Some(path));
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// `SYNDICA_DB_PATH` is required; everything else has defaults or is
/// optional.
pub fn load_from_env() -> Result<SyndicaConfig> {
    let db_path = env_var("SYNDICA_DB_PATH")?;
    let pool_size = env_parse("SYNDICA_DB_POOL_SIZE", 4u32)?;

    let http = HttpConfig {
        timeout_seconds: env_parse("SYNDICA_HTTP_TIMEOUT", HttpConfig::default().timeout_seconds)?,
        retry_attempts: env_parse(
            "SYNDICA_HTTP_RETRY_ATTEMPTS",
            HttpConfig::default().retry_attempts,
        )?,
        base_backoff_ms: env_parse(
            "SYNDICA_HTTP_BASE_BACKOFF_MS",
            HttpConfig::default().base_backoff_ms,
        )?,
    };

    Ok(SyndicaConfig {
        database: DatabaseConfig { path: db_path, pool_size },
        http,
        default_timezone: std::env::var("SYNDICA_DEFAULT_TIMEZONE")
            .unwrap_or_else(|_| "UTC".to_string()),
        platforms: platforms_from_env(),
    })
}

fn platforms_from_env() -> PlatformsConfig {
    let facebook = match (opt_var("SYNDICA_FACEBOOK_ACCESS_TOKEN"), opt_var("SYNDICA_FACEBOOK_PAGE_ID"))
    {
        (Some(access_token), Some(page_id)) => Some(FacebookConfig {
            access_token,
            page_id,
            api_version: opt_var("SYNDICA_FACEBOOK_API_VERSION")
                .unwrap_or_else(|| "v20.0".to_string()),
        }),
        _ => None,
    };

    let twitter =
        opt_var("SYNDICA_TWITTER_BEARER_TOKEN").map(|bearer_token| TwitterConfig { bearer_token });

    let linkedin = match (opt_var("SYNDICA_LINKEDIN_ACCESS_TOKEN"), opt_var("SYNDICA_LINKEDIN_AUTHOR_URN"))
    {
        (Some(access_token), Some(author_urn)) => {
            Some(LinkedInConfig { access_token, author_urn })
        }
        _ => None,
    };

    let telegram = match (opt_var("SYNDICA_TELEGRAM_BOT_TOKEN"), opt_var("SYNDICA_TELEGRAM_CHAT_ID")) {
        (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
            bot_token,
            chat_id,
            api_base_url: opt_var("SYNDICA_TELEGRAM_API_BASE_URL")
                .unwrap_or_else(|| "https://api.telegram.org/bot".to_string()),
        }),
        _ => None,
    };

    PlatformsConfig { facebook, twitter, linkedin, telegram }
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations. Format is detected
/// by extension (`.toml` or `.json`).
pub fn load_from_file(path: Option<PathBuf>) -> Result<SyndicaConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SyndicaError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SyndicaError::Config("no config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SyndicaError::Config(format!("failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<SyndicaConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SyndicaError::Config(format!("invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SyndicaError::Config(format!("invalid JSON format: {e}"))),
        other => Err(SyndicaError::Config(format!("unsupported config format: {other}"))),
    }
}

/// Probe the standard locations for a config file.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("syndica.toml"),
            cwd.join("syndica.json"),
            cwd.join("config.toml"),
            cwd.join("config.json"),
            cwd.join("../syndica.toml"),
            cwd.join("../syndica.json"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join("syndica.toml"));
            candidates.push(exe_dir.join("syndica.json"));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SyndicaError::Config(format!("missing required environment variable: {key}")))
}

fn opt_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| SyndicaError::Config(format!("invalid value for {key}: '{raw}'"))),
        Err(_) => Ok(default),
    }
}
