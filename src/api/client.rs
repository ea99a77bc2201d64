//! Blocking HTTP client for the collections list endpoint
//!
//! One request per call, no retries: retry policy belongs to whoever
//! re-runs the sweep. Errors carry the server's own error messages when
//! the response body has them.

use super::types::{CollectionList, ListParams};
use super::CollectionSource;
use crate::error::{ApiError, ApiResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Path of the collections list endpoint, relative to the API base URL
pub const COLLECTIONS_PATH: &str = "arvados/v1/collections";

/// Longest slice of an unparseable error body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// API client bound to one cluster
#[derive(Debug, Clone)]
pub struct ArvadosClient {
    base_url: String,
    token: String,
    http: reqwest::blocking::Client,
}

impl ArvadosClient {
    /// Start building a client for `base_url` (e.g. `https://zzzzz.example.com`)
    pub fn builder(base_url: impl Into<String>, token: impl Into<String>) -> ArvadosClientBuilder {
        ArvadosClientBuilder::new(base_url, token)
    }

    /// API base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collections_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), COLLECTIONS_PATH)
    }
}

impl CollectionSource for ArvadosClient {
    fn list(&self, params: &ListParams) -> ApiResult<CollectionList> {
        let query = params.query_pairs()?;
        debug!(
            filters = params.filters.len(),
            limit = ?params.limit,
            count = params.count.as_str(),
            "GET {}",
            COLLECTIONS_PATH
        );

        let response = self
            .http
            .get(self.collections_url())
            .bearer_auth(&self.token)
            .query(&query)
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Extract a readable message from an error response body
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if !parsed.errors.is_empty() {
            return parsed.errors.join("; ");
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }

    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Builder for [`ArvadosClient`]
#[derive(Debug, Clone)]
pub struct ArvadosClientBuilder {
    base_url: String,
    token: String,
    timeout: Duration,
    insecure: bool,
}

impl ArvadosClientBuilder {
    /// Create a builder with a 5 minute request timeout
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: Duration::from_secs(300),
            insecure: false,
        }
    }

    /// Per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accept invalid TLS certificates
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Build the client
    pub fn build(self) -> ApiResult<ArvadosClient> {
        let http = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.insecure)
            .user_agent(concat!("keep-sweep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(ArvadosClient {
            base_url: self.base_url,
            token: self.token,
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_errors_array() {
        let body = r#"{"errors":["Forbidden","token expired"],"error_token":"123"}"#;
        assert_eq!(error_message(body), "Forbidden; token expired");
    }

    #[test]
    fn test_error_message_plain_body() {
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
        assert_eq!(error_message(""), "(empty response body)");

        let long = "x".repeat(MAX_ERROR_BODY + 10);
        let msg = error_message(&long);
        assert_eq!(msg.len(), MAX_ERROR_BODY + 3);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_collections_url() {
        let client = ArvadosClient::builder("https://zzzzz.example.com/", "token")
            .build()
            .unwrap();
        assert_eq!(
            client.collections_url(),
            "https://zzzzz.example.com/arvados/v1/collections"
        );
    }
}
