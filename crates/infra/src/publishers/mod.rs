//! Concrete platform publishers.
//!
//! Each publisher owns its credentials, shapes requests for one platform's
//! API and funnels every call through the shared retrying [`HttpClient`].
//! Publishers are constructed once at process start from the platforms
//! section of the configuration and injected into the dispatcher; only
//! platforms with credentials present are registered.

pub mod facebook;
pub mod linkedin;
pub mod telegram;
pub mod twitter;

use std::sync::Arc;

use syndica_core::dispatch::{Publisher, PublisherRegistry};
use syndica_domain::{PlatformsConfig, Result, SyndicaError};

pub use facebook::FacebookPublisher;
pub use linkedin::LinkedInPublisher;
pub use telegram::TelegramPublisher;
pub use twitter::TwitterPublisher;

use crate::http::HttpClient;

/// Build the publisher registry from configured credentials.
pub fn build_registry(platforms: &PlatformsConfig, http: &HttpClient) -> PublisherRegistry {
    let mut registry = PublisherRegistry::new();

    if let Some(config) = &platforms.facebook {
        insert(&mut registry, Arc::new(FacebookPublisher::new(config.clone(), http.clone())));
    }
    if let Some(config) = &platforms.twitter {
        insert(&mut registry, Arc::new(TwitterPublisher::new(config.clone(), http.clone())));
    }
    if let Some(config) = &platforms.linkedin {
        insert(&mut registry, Arc::new(LinkedInPublisher::new(config.clone(), http.clone())));
    }
    if let Some(config) = &platforms.telegram {
        insert(&mut registry, Arc::new(TelegramPublisher::new(config.clone(), http.clone())));
    }

    registry
}

fn insert(registry: &mut PublisherRegistry, publisher: Arc<dyn Publisher>) {
    registry.insert(publisher.name().to_string(), publisher);
}

/// Reject empty or over-long caption text before calling out.
pub(crate) fn validate_text(text: &str, max_length: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(SyndicaError::Delivery("text content cannot be empty".to_string()));
    }
    if text.len() > max_length {
        return Err(SyndicaError::Delivery(format!(
            "text content exceeds maximum length of {max_length} characters"
        )));
    }
    Ok(())
}

/// Reject anything that does not parse as an absolute http(s) URL.
pub(crate) fn validate_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| SyndicaError::Delivery(format!("invalid URL provided: {url}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SyndicaError::Delivery(format!("invalid URL provided: {url}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use syndica_domain::TelegramConfig;

    use super::*;

    #[test]
    fn validate_text_rejects_blank_and_oversized_input() {
        assert!(validate_text("hello", 10).is_ok());
        assert!(validate_text("   ", 10).is_err());
        assert!(validate_text("hello world", 5).is_err());
    }

    #[test]
    fn validate_url_requires_an_absolute_http_url() {
        assert!(validate_url("https://example.com/a.png").is_ok());
        assert!(validate_url("ftp://example.com/a.png").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn registry_only_contains_configured_platforms() {
        let http = HttpClient::builder().build().expect("http client");
        let platforms = PlatformsConfig {
            telegram: Some(TelegramConfig {
                bot_token: "token".to_string(),
                chat_id: "chat".to_string(),
                api_base_url: "https://api.telegram.org/bot".to_string(),
            }),
            ..PlatformsConfig::default()
        };

        let registry = build_registry(&platforms, &http);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_key("telegram"));
    }
}
