//! PostgREST client implementation
//!
//! This module implements the small slice of the PostgREST protocol (as served
//! by Supabase under `/rest/v1`) needed to read, insert and delete rows:
//! request/response types, error handling and the HTTP client itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};

// =============================================================================
// Error Types
// =============================================================================

/// PostgREST error with HTTP status and message
///
/// Transport failures (no response at all) are reported with status 0.
///
/// # Examples
/// ```
/// use remote_table::postgrest::PostgrestError;
///
/// let error = PostgrestError::new(409, "23505", "duplicate key value");
/// assert_eq!(error.status(), 409);
/// assert!(!error.is_network_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgrestError {
    /// HTTP status code
    status: u16,
    /// Error code (a Postgres SQLSTATE or PostgREST `PGRST...` code)
    code: String,
    /// Human-readable error message
    message: String,
}

impl PostgrestError {
    /// Create a new PostgREST error
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { status, code: code.into(), message: message.into() }
    }

    /// Create a transport-level error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, "NetworkError", message)
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the error code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this error came from the network rather than the server's logic
    pub fn is_network_error(&self) -> bool {
        matches!(self.status, 0 | 408 | 425 | 429 | 500 | 502 | 503 | 504 | 522 | 524)
    }
}

impl std::fmt::Display for PostgrestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PostgREST error {}: {} - {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for PostgrestError {}

/// Standard PostgREST error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgrestErrorResponse {
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    pub message: String,
    /// Extra detail, if any
    #[serde(default)]
    pub details: Option<String>,
    /// Suggested fix, if any
    #[serde(default)]
    pub hint: Option<String>,
}

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method for PostgREST requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Select rows
    Get,
    /// Insert rows
    Post,
    /// Delete rows
    Delete,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A request against one table
#[derive(Debug, Clone)]
pub struct PostgrestRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Table name
    pub table: String,
    /// Query parameters, in order (filters, `select`)
    pub params: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// JSON request body
    pub body: Option<Vec<u8>>,
}

impl PostgrestRequest {
    fn new(method: HttpMethod, table: impl Into<String>) -> Self {
        Self {
            method,
            table: table.into(),
            params: Vec::new(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Create a select request returning the given columns
    pub fn select(table: impl Into<String>, columns: &str) -> Self {
        Self::new(HttpMethod::Get, table).param("select", columns)
    }

    /// Create an insert request; the server is asked not to echo the row back
    pub fn insert<T: Serialize>(table: impl Into<String>, row: &T) -> Result<Self, serde_json::Error> {
        let mut request = Self::new(HttpMethod::Post, table).header("Prefer", "return=minimal");
        request.body = Some(serde_json::to_vec(row)?);
        Ok(request)
    }

    /// Create a delete request; narrow it with [`PostgrestRequest::eq`]
    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, table)
    }

    /// Add an equality filter (`column=eq.value`)
    pub fn eq(self, column: impl Into<String>, value: impl AsRef<str>) -> Self {
        let filter = format!("eq.{}", value.as_ref());
        self.param(column, filter)
    }

    /// Add a raw query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Successful PostgREST response
#[derive(Debug, Clone)]
pub struct PostgrestResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body (empty for `return=minimal` writes)
    pub body: String,
}

impl PostgrestResponse {
    /// Decode the body as JSON
    pub fn json<T>(&self) -> Result<T, PostgrestError>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_str(&self.body).map_err(|e| {
            PostgrestError::new(self.status, "ParseError", format!("Failed to parse JSON: {}", e))
        })
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for [`PostgrestClient`]
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project URL (e.g., "https://xyz.supabase.co")
    pub project_url: String,
    /// Anonymous API key, sent as `apikey` and bearer token
    pub anon_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl PostgrestConfig {
    /// Create a new config
    pub fn new(project_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            project_url: project_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(15),
            user_agent: format!("Larry-Butter/{}", env!("CARGO_PKG_VERSION")),
        }
    }

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

    /// Base URL of the REST endpoint
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.project_url)
    }
}

// =============================================================================
// Client Implementation
// =============================================================================

/// Client for a PostgREST endpoint
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    client: ReqwestClient,
    config: PostgrestConfig,
}

impl PostgrestClient {
    /// Create a new client
    pub fn new(config: PostgrestConfig) -> Result<Self, PostgrestError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| PostgrestError::new(0, "ClientBuild", e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Execute a request and return the raw successful response
    pub async fn execute(&self, request: PostgrestRequest) -> Result<PostgrestResponse, PostgrestError> {
        let url = format!("{}/{}", self.config.rest_url(), request.table);

        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };

        if !request.params.is_empty() {
            req = req.query(&request.params);
        }

        req = req
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {}", self.config.anon_key));

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = &request.body {
            req = req.header("Content-Type", "application/json").body(body.clone());
        }

        tracing::debug!(method = request.method.as_str(), table = %request.table, "postgrest request");

        let response = req
            .send()
            .await
            .map_err(|e| PostgrestError::network(format!("Request failed: {}", e)))?;

        self.parse_response(response).await
    }

    async fn parse_response(&self, response: ReqwestResponse) -> Result<PostgrestResponse, PostgrestError> {
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();

            return match serde_json::from_str::<PostgrestErrorResponse>(&error_body) {
                Ok(error_response) => Err(PostgrestError::new(
                    status,
                    error_response.code.unwrap_or_else(|| "Unknown".to_string()),
                    error_response.message,
                )),
                Err(_) => Err(PostgrestError::new(
                    status,
                    "Unknown",
                    format!("HTTP {}: {}", status, error_body),
                )),
            };
        }

        let body = response.text().await.map_err(|e| {
            PostgrestError::network(format!("Failed to read response: {}", e))
        })?;

        Ok(PostgrestResponse { status, body })
    }

    /// Get the client configuration
    pub fn config(&self) -> &PostgrestConfig {
        &self.config
    }
}
