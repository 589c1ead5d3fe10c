//! HTTP client for the public read-only catalogs

use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::retry::{retry_http, RetryConfig};

/// HTTP errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Response body was not the expected JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// Client could not be constructed
    #[error("Client build error: {0}")]
    Build(String),
}

impl HttpError {
    /// Whether a retry has a reasonable chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Network(_) => true,
            HttpError::Status { status, .. } => {
                matches!(status, 408 | 425 | 429 | 500 | 502 | 503 | 504)
            }
            HttpError::Decode(_) | HttpError::Build(_) => false,
        }
    }
}

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// Configuration for [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Retry policy for GET requests
    pub retry: RetryConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("Larry-Butter/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryConfig::default(),
        }
    }
}

impl HttpClientConfig {
    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Thin JSON-over-HTTP client with retries on transient failures
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// GET `url` and decode the JSON body, retrying transient failures
    pub async fn get_json<T>(&self, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        retry_http(&self.config.retry, || self.get_json_once(url)).await
    }

    async fn get_json_once<T>(&self, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(HttpError::Status { status: status.as_u16(), body });
        }

        serde_json::from_str(&body).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}
