//! LinkedIn publisher on the `ugcPosts` endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use syndica_core::dispatch::Publisher;
use syndica_domain::{LinkedInConfig, Result, SyndicaError};
use tracing::info;

use super::{validate_text, validate_url};
use crate::http::HttpClient;

const API_BASE_URL: &str = "https://api.linkedin.com/v2";
const MAX_CAPTION: usize = 3000;

pub struct LinkedInPublisher {
    http: HttpClient,
    access_token: String,
    author_urn: String,
}

impl LinkedInPublisher {
    pub fn new(config: LinkedInConfig, http: HttpClient) -> Self {
        Self { http, access_token: config.access_token, author_urn: config.author_urn }
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| SyndicaError::Config("linkedin access token is not valid ASCII".into()))?;
        headers.insert(AUTHORIZATION, value);
        headers.insert("X-Restli-Protocol-Version", HeaderValue::from_static("2.0.0"));
        Ok(headers)
    }

    /// `ugcPosts` payload with the given share category and optional media.
    fn ugc_post(&self, caption: &str, category: &str, media_url: Option<&str>) -> Value {
        let media = media_url.map_or_else(
            || json!([]),
            |url| {
                json!([{
                    "status": "READY",
                    "description": { "text": caption },
                    "media": url,
                }])
            },
        );
        json!({
            "author": self.author_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": caption },
                    "shareMediaCategory": category,
                    "media": media,
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
            }
        })
    }
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    fn name(&self) -> &str {
        "linkedin"
    }

    async fn share(&self, caption: &str, url: &str) -> Result<Value> {
        validate_text(caption, MAX_CAPTION)?;

        let body = if url.is_empty() {
            self.ugc_post(caption, "NONE", None)
        } else {
            validate_url(url)?;
            self.ugc_post(caption, "ARTICLE", Some(url))
        };

        let response = self
            .http
            .post_json(&format!("{API_BASE_URL}/ugcPosts"), &body, self.auth_headers()?)
            .await?;
        info!(post_id = ?response.get("id"), "linkedin post shared");
        Ok(response)
    }

    async fn share_image(&self, caption: &str, media_url: &str) -> Result<Value> {
        validate_text(caption, MAX_CAPTION)?;
        validate_url(media_url)?;

        let body = self.ugc_post(caption, "IMAGE", Some(media_url));
        let response = self
            .http
            .post_json(&format!("{API_BASE_URL}/ugcPosts"), &body, self.auth_headers()?)
            .await?;
        info!(post_id = ?response.get("id"), "linkedin image shared");
        Ok(response)
    }

    async fn share_video(&self, _caption: &str, _media_url: &str) -> Result<Value> {
        Err(SyndicaError::Delivery(
            "linkedin video posting is not supported".to_string(),
        ))
    }
}
