//! Facebook Graph API publisher.
//!
//! Posts to a page's `feed`, `photos` and `videos` edges. Video uploads go
//! through the dedicated `graph-video` host and hand Facebook a remote file
//! URL; the chunked upload protocol is the platform's own concern, not the
//! scheduler's.

use async_trait::async_trait;
use serde_json::Value;
use syndica_core::dispatch::Publisher;
use syndica_domain::{FacebookConfig, Result};
use tracing::info;

use super::{validate_text, validate_url};
use crate::http::HttpClient;

const MAX_CAPTION: usize = 2000;

pub struct FacebookPublisher {
    http: HttpClient,
    access_token: String,
    page_id: String,
    api_version: String,
}

impl FacebookPublisher {
    pub fn new(config: FacebookConfig, http: HttpClient) -> Self {
        Self {
            http,
            access_token: config.access_token,
            page_id: config.page_id,
            api_version: config.api_version,
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        // Video uploads go to the dedicated media host.
        let host =
            if endpoint.contains("videos") { "graph-video.facebook.com" } else { "graph.facebook.com" };
        format!("https://{host}/{}/{}/{endpoint}", self.api_version, self.page_id)
    }

    fn params(&self, mut params: Vec<(String, String)>) -> Vec<(String, String)> {
        params.push(("access_token".to_string(), self.access_token.clone()));
        params
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn share(&self, caption: &str, url: &str) -> Result<Value> {
        validate_text(caption, MAX_CAPTION)?;

        let mut params = vec![("message".to_string(), caption.to_string())];
        if !url.is_empty() {
            validate_url(url)?;
            params.push(("link".to_string(), url.to_string()));
        }

        let response = self.http.post_form(&self.api_url("feed"), &self.params(params)).await?;
        info!(post_id = ?response.get("id"), "facebook post shared");
        Ok(response)
    }

    async fn share_image(&self, caption: &str, media_url: &str) -> Result<Value> {
        validate_text(caption, MAX_CAPTION)?;
        validate_url(media_url)?;

        let params = vec![
            ("url".to_string(), media_url.to_string()),
            ("caption".to_string(), caption.to_string()),
        ];

        let response = self.http.post_form(&self.api_url("photos"), &self.params(params)).await?;
        info!(post_id = ?response.get("id"), "facebook image shared");
        Ok(response)
    }

    async fn share_video(&self, caption: &str, media_url: &str) -> Result<Value> {
        validate_text(caption, MAX_CAPTION)?;
        validate_url(media_url)?;

        let params = vec![
            ("file_url".to_string(), media_url.to_string()),
            ("description".to_string(), caption.to_string()),
            ("title".to_string(), caption.to_string()),
        ];

        let response = self.http.post_form(&self.api_url("videos"), &self.params(params)).await?;
        info!(video_id = ?response.get("id"), "facebook video shared");
        Ok(response)
    }
}
