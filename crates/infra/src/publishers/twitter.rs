//! Twitter/X publisher on the v2 `tweets` endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use syndica_core::dispatch::Publisher;
use syndica_domain::{Result, SyndicaError, TwitterConfig};
use tracing::info;

use super::validate_text;
use crate::http::HttpClient;

const API_BASE_URL: &str = "https://api.twitter.com/2";
const MAX_TWEET: usize = 280;

pub struct TwitterPublisher {
    http: HttpClient,
    bearer_token: String,
}

impl TwitterPublisher {
    pub fn new(config: TwitterConfig, http: HttpClient) -> Self {
        Self { http, bearer_token: config.bearer_token }
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.bearer_token))
            .map_err(|_| SyndicaError::Config("twitter bearer token is not valid ASCII".into()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    fn tweet_text(caption: &str, url: &str) -> String {
        if url.is_empty() {
            caption.to_string()
        } else {
            format!("{caption} {url}")
        }
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn share(&self, caption: &str, url: &str) -> Result<Value> {
        validate_text(caption, MAX_TWEET)?;
        let text = Self::tweet_text(caption, url);
        if text.len() > MAX_TWEET {
            return Err(SyndicaError::Delivery(format!(
                "tweet text exceeds {MAX_TWEET} character limit"
            )));
        }

        let body = json!({ "text": text });
        let response = self
            .http
            .post_json(&format!("{API_BASE_URL}/tweets"), &body, self.auth_headers()?)
            .await?;
        info!(tweet_id = ?response.pointer("/data/id"), "tweet shared");
        Ok(response)
    }

    async fn share_image(&self, _caption: &str, _media_url: &str) -> Result<Value> {
        // v2 media upload needs elevated API access the bearer token does
        // not grant.
        Err(SyndicaError::Delivery(
            "twitter image upload requires elevated API access".to_string(),
        ))
    }

    async fn share_video(&self, _caption: &str, _media_url: &str) -> Result<Value> {
        Err(SyndicaError::Delivery(
            "twitter video upload requires elevated API access".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tweet_text_appends_the_link_when_present() {
        assert_eq!(TwitterPublisher::tweet_text("hello", ""), "hello");
        assert_eq!(
            TwitterPublisher::tweet_text("hello", "https://example.com"),
            "hello https://example.com"
        );
    }

    #[tokio::test]
    async fn share_rejects_text_over_the_tweet_limit() {
        let http = HttpClient::builder().build().expect("http client");
        let publisher =
            TwitterPublisher::new(TwitterConfig { bearer_token: "token".to_string() }, http);

        let caption = "x".repeat(270);
        let err = publisher.share(&caption, "https://example.com/a-long-path").await.unwrap_err();
        assert!(err.to_string().contains("280"));
    }

    #[tokio::test]
    async fn media_operations_surface_a_delivery_error() {
        let http = HttpClient::builder().build().expect("http client");
        let publisher =
            TwitterPublisher::new(TwitterConfig { bearer_token: "token".to_string() }, http);

        let err = publisher.share_image("hi", "https://example.com/a.png").await.unwrap_err();
        assert!(matches!(err, SyndicaError::Delivery(_)));
    }
}
