//! HTTP client trait and implementations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::FetchError;

use super::rate_limiter::RateLimiter;

/// Raw response body plus the header needed to decode it.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Trait for HTTP clients, enabling mockability in tests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET a URL. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// GET a URL and keep only the body.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(self.fetch(url).await?.body)
    }
}

/// Configuration for [`ReqwestClient`].
#[derive(Clone)]
pub struct ReqwestClientBuilder {
    fetch_delay_ms: u64,
    timeout: Duration,
    user_agent: String,
    accept_invalid_certs: bool,
}

impl Default for ReqwestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestClientBuilder {
    /// Create a new builder with default settings.
    ///
    /// Environment variables:
    /// - `KONDATE_FETCH_DELAY_MS`: delay between requests to one host (default 1000)
    /// - `KONDATE_USER_AGENT`: user agent header
    /// - `KONDATE_ACCEPT_INVALID_CERTS`: "true" to skip TLS verification
    pub fn new() -> Self {
        let fetch_delay_ms = std::env::var("KONDATE_FETCH_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        let user_agent = std::env::var("KONDATE_USER_AGENT")
            .unwrap_or_else(|_| "Mozilla/5.0 (compatible; kondate/0.1)".to_string());

        let accept_invalid_certs = std::env::var("KONDATE_ACCEPT_INVALID_CERTS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            fetch_delay_ms,
            timeout: Duration::from_secs(30),
            user_agent,
            accept_invalid_certs,
        }
    }

    /// Set the delay between requests in milliseconds. 0 disables throttling.
    pub fn fetch_delay_ms(mut self, ms: u64) -> Self {
        self.fetch_delay_ms = ms;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Several broadcaster sites serve broken certificate chains.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<ReqwestClient, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;

        Ok(ReqwestClient {
            inner,
            rate_limiter: RateLimiter::new(Duration::from_millis(self.fetch_delay_ms)),
        })
    }
}

/// Production HTTP client with per-host throttling.
pub struct ReqwestClient {
    inner: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        ReqwestClientBuilder::new().build()
    }

    pub fn builder() -> ReqwestClientBuilder {
        ReqwestClientBuilder::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        if let Some(host) = parsed.host_str() {
            self.rate_limiter.wait(host).await;
        }

        tracing::debug!(url, "network: fetching");
        let response = self.inner.get(parsed).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url, status = %status, "network: request failed");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.bytes().await?.to_vec();
        tracing::debug!(url, bytes = body.len(), "network: fetched");

        Ok(FetchedPage {
            url: url.to_string(),
            content_type,
            body,
        })
    }
}

/// Mock response for testing.
#[derive(Clone)]
pub enum MockResponse {
    Page {
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Status(u16),
}

/// Mock HTTP client for testing. Records every URL it is asked for.
#[derive(Default)]
pub struct MockClient {
    responses: HashMap<String, MockResponse>,
    requests: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_body(url, Some("text/html; charset=utf-8"), html.as_bytes().to_vec())
    }

    pub fn with_json(self, url: &str, json: &str) -> Self {
        self.with_body(url, Some("application/json"), json.as_bytes().to_vec())
    }

    pub fn with_body(mut self, url: &str, content_type: Option<&str>, body: Vec<u8>) -> Self {
        self.responses.insert(
            url.to_string(),
            MockResponse::Page {
                content_type: content_type.map(|s| s.to_string()),
                body,
            },
        );
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), MockResponse::Status(status));
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        match self.responses.get(url) {
            Some(MockResponse::Page { content_type, body }) => Ok(FetchedPage {
                url: url.to_string(),
                content_type: content_type.clone(),
                body: body.clone(),
            }),
            Some(MockResponse::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Unavailable(url.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_counts_requests() {
        let client = MockClient::new()
            .with_html("https://example.com/a", "<p>a</p>")
            .with_status("https://example.com/b", 404);

        let page = client.fetch("https://example.com/a").await.unwrap();
        assert_eq!(page.body, b"<p>a</p>");
        assert_eq!(page.content_type.as_deref(), Some("text/html; charset=utf-8"));

        let err = client.fetch("https://example.com/b").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));

        let err = client.fetch("https://example.com/c").await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));

        client.fetch_bytes("https://example.com/a").await.unwrap();
        assert_eq!(client.request_count("https://example.com/a"), 2);
        assert_eq!(client.requests().len(), 4);
    }

    #[tokio::test]
    async fn reqwest_client_rejects_invalid_url() {
        let client = ReqwestClient::builder().fetch_delay_ms(0).build().unwrap();
        let err = client.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
