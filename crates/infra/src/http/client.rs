//! HTTP client with built-in retry and timeout support.
//!
//! Every publisher funnels its outbound calls through this client. A failed
//! attempt that is not the last waits `base_backoff * 2^(attempt-1)` before
//! the next try. Client errors (4xx) are terminal immediately; server errors
//! and transport failures retry. The terminal error carries the message
//! extracted from the remote response body.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use syndica_domain::{HttpConfig, Result, SyndicaError};
use tracing::{debug, warn};

/// Shared retrying HTTP client.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Construct a client from the application's HTTP configuration.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Self::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .max_attempts(config.retry_attempts)
            .base_backoff(Duration::from_millis(config.base_backoff_ms))
            .build()
    }

    /// POST a JSON body and parse the JSON response.
    pub async fn post_json(&self, url: &str, body: &Value, headers: HeaderMap) -> Result<Value> {
        let builder = self.client.post(url).headers(headers).json(body);
        self.send_json(builder).await
    }

    /// POST form parameters and parse the JSON response.
    pub async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Value> {
        let builder = self.client.post(url).form(form);
        self.send_json(builder).await
    }

    /// GET with query parameters and parse the JSON response.
    pub async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        let builder = self.client.get(url).query(query);
        self.send_json(builder).await
    }

    /// Execute the request with retry semantics and decode the body.
    async fn send_json(&self, builder: RequestBuilder) -> Result<Value> {
        let attempts = self.max_attempts.max(1);

        for attempt in 1..=attempts {
            let cloned = builder.try_clone().ok_or_else(|| {
                SyndicaError::Internal(
                    "request body cannot be cloned; buffer the body to enable retries".into(),
                )
            })?;

            match cloned.send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt, %status, "received HTTP response");

                    if status.is_success() {
                        return decode_body(response).await;
                    }

                    let message = extract_error_message(status, response).await;

                    // 4xx will not improve on retry; surface it right away.
                    if status.is_client_error() || attempt == attempts {
                        return Err(SyndicaError::Delivery(format!(
                            "API request failed: {message}"
                        )));
                    }

                    warn!(attempt, %status, error = %message, "request failed, retrying");
                    self.sleep_with_backoff(attempt).await;
                }
                Err(err) => {
                    debug!(attempt, error = %err, "HTTP request failed");

                    if attempt == attempts {
                        return Err(SyndicaError::Delivery(format!("request failed: {err}")));
                    }

                    warn!(attempt, error = %err, "transport failure, retrying");
                    self.sleep_with_backoff(attempt).await;
                }
            }
        }

        Err(SyndicaError::Internal("http client exhausted retries without a result".into()))
    }

    fn backoff_delay(&self, failed_attempt: usize) -> Duration {
        let shift = failed_attempt.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    async fn sleep_with_backoff(&self, failed_attempt: usize) {
        let delay = self.backoff_delay(failed_attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| SyndicaError::Internal(format!("failed to build http client: {err}")))?;

        Ok(HttpClient {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
        })
    }
}

async fn decode_body(response: Response) -> Result<Value> {
    let body = response
        .text()
        .await
        .map_err(|err| SyndicaError::Delivery(format!("failed to read response body: {err}")))?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|err| SyndicaError::Delivery(format!("invalid JSON response: {err}")))
}

/// Pull a human-readable message out of an error response.
///
/// Probes `error.message`, then `message`, then `error` (string or any JSON
/// value), falling back to `HTTP <status>: <body>`.
async fn extract_error_message(status: StatusCode, response: Response) -> String {
    let body = response.text().await.unwrap_or_default();

    if let Ok(data) = serde_json::from_str::<Value>(&body) {
        if let Some(message) = data.pointer("/error/message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(message) = data.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(error) = data.get("error") {
            return match error.as_str() {
                Some(text) => text.to_string(),
                None => error.to_string(),
            };
        }
    }

    format!("HTTP {}: {body}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    fn client_with_defaults() -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(10))
            .max_attempts(3)
            .build()
            .expect("http client")
    }

    #[tokio::test]
    async fn succeeds_on_the_third_attempt_within_the_default_limit() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("POST"))
            .respond_with(move |_req: &Request| -> ResponseTemplate {
                let current = attempts_clone.fetch_add(1, Ordering::SeqCst);
                if current < 2 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({ "id": "42" }))
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let result =
            client.post_json(&server.uri(), &json!({}), HeaderMap::new()).await.expect("response");

        assert_eq!(result, json!({ "id": "42" }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_all_attempts_surfaces_a_terminal_delivery_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "message": "still broken" })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let err = client.post_json(&server.uri(), &json!({}), HeaderMap::new()).await.unwrap_err();

        assert!(matches!(err, SyndicaError::Delivery(_)));
        assert!(err.to_string().contains("still broken"));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_terminal_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "caption too long" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let err = client.post_json(&server.uri(), &json!({}), HeaderMap::new()).await.unwrap_err();

        assert!(err.to_string().contains("caption too long"));
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_status_and_body_when_the_error_is_not_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let err = client.post_json(&server.uri(), &json!({}), HeaderMap::new()).await.unwrap_err();

        assert!(err.to_string().contains("HTTP 403: forbidden"));
    }

    #[tokio::test]
    async fn empty_success_body_decodes_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let result =
            client.post_json(&server.uri(), &json!({}), HeaderMap::new()).await.expect("response");
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn backoff_doubles_per_failed_attempt() {
        let client = HttpClient::builder()
            .base_backoff(Duration::from_millis(100))
            .build()
            .expect("http client");
        assert_eq!(client.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(client.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(client.backoff_delay(3), Duration::from_millis(400));
    }
}
