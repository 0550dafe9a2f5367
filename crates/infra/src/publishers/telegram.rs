//! Telegram bot API publisher.
//!
//! The API base URL is configurable so tests can point the publisher at a
//! local mock server.

use async_trait::async_trait;
use serde_json::Value;
use syndica_core::dispatch::Publisher;
use syndica_domain::{Result, TelegramConfig};
use tracing::info;

use super::{validate_text, validate_url};
use crate::http::HttpClient;

const MAX_CAPTION: usize = 4096;

pub struct TelegramPublisher {
    http: HttpClient,
    bot_token: String,
    chat_id: String,
    api_base_url: String,
}

impl TelegramPublisher {
    pub fn new(config: TelegramConfig, http: HttpClient) -> Self {
        Self {
            http,
            bot_token: config.bot_token,
            chat_id: config.chat_id,
            api_base_url: config.api_base_url,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}{}/{method}", self.api_base_url, self.bot_token)
    }

    fn message_text(caption: &str, url: &str) -> String {
        if url.is_empty() {
            caption.to_string()
        } else {
            format!("{caption}\n{url}")
        }
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn share(&self, caption: &str, url: &str) -> Result<Value> {
        validate_text(caption, MAX_CAPTION)?;

        let form = vec![
            ("chat_id".to_string(), self.chat_id.clone()),
            ("text".to_string(), Self::message_text(caption, url)),
        ];
        let response = self.http.post_form(&self.method_url("sendMessage"), &form).await?;
        info!(message_id = ?response.pointer("/result/message_id"), "telegram message sent");
        Ok(response)
    }

    async fn share_image(&self, caption: &str, media_url: &str) -> Result<Value> {
        validate_text(caption, MAX_CAPTION)?;
        validate_url(media_url)?;

        let form = vec![
            ("chat_id".to_string(), self.chat_id.clone()),
            ("photo".to_string(), media_url.to_string()),
            ("caption".to_string(), caption.to_string()),
        ];
        let response = self.http.post_form(&self.method_url("sendPhoto"), &form).await?;
        info!(message_id = ?response.pointer("/result/message_id"), "telegram photo sent");
        Ok(response)
    }

    async fn share_video(&self, caption: &str, media_url: &str) -> Result<Value> {
        validate_text(caption, MAX_CAPTION)?;
        validate_url(media_url)?;

        let form = vec![
            ("chat_id".to_string(), self.chat_id.clone()),
            ("video".to_string(), media_url.to_string()),
            ("caption".to_string(), caption.to_string()),
        ];
        let response = self.http.post_form(&self.method_url("sendVideo"), &form).await?;
        info!(message_id = ?response.pointer("/result/message_id"), "telegram video sent");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use syndica_domain::SyndicaError;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn publisher(base_url: String) -> TelegramPublisher {
        let http = HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .max_attempts(2)
            .build()
            .expect("http client");
        TelegramPublisher::new(
            TelegramConfig {
                bot_token: "test-token".to_string(),
                chat_id: "-100123".to_string(),
                api_base_url: base_url,
            },
            http,
        )
    }

    #[tokio::test]
    async fn share_hits_send_message_with_chat_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_string_contains("chat_id=-100123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 7 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = publisher(format!("{}/bot", server.uri()));
        let response = publisher.share("hello", "https://example.com").await.expect("response");
        assert_eq!(response.pointer("/result/message_id"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn share_image_hits_send_photo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendPhoto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 8 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = publisher(format!("{}/bot", server.uri()));
        publisher.share_image("hello", "https://example.com/a.png").await.expect("response");
    }

    #[tokio::test]
    async fn api_rejection_surfaces_the_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error": { "message": "chat not found" }
            })))
            .mount(&server)
            .await;

        let publisher = publisher(format!("{}/bot", server.uri()));
        let err = publisher.share("hello", "").await.unwrap_err();
        assert!(matches!(err, SyndicaError::Delivery(_)));
        assert!(err.to_string().contains("chat not found"));
    }
}
