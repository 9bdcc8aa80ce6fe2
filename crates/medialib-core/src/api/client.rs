//! HTTP client for the asset store's REST API.
//!
//! This module provides the `GatewayClient` struct for listing/searching
//! stored assets and deleting them in batches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{ApiError, AssetGateway};
use crate::models::{BatchDeleteResponse, SearchQuery, SearchResponse};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow listing responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Path of the search endpoint, relative to the gateway base URL
const SEARCH_PATH: &str = "resources/search";

/// Path of the batch delete endpoint, relative to the gateway base URL
const DELETE_PATH: &str = "resources/image/upload";

#[derive(Debug, Serialize)]
struct BatchDeleteRequest<'a> {
    public_ids: &'a [String],
}

/// Gateway client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    token: Option<Arc<String>>,
}

impl GatewayClient {
    /// Create a new client for the gateway at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: impl Into<Arc<String>>) {
        self.token = Some(token.into());
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let token = self
            .token
            .as_ref()
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::MissingCredential)?;

        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ApiError::InvalidResponse(format!("Invalid token: {}", e)))?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request built by `build`, retrying on rate limiting with
    /// exponential backoff, and decode the JSON body.
    async fn send_json<T, F>(&self, url: &str, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let headers = self.auth_headers()?;
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build(&self.client).headers(headers.clone()).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    return serde_json::from_str(&text).map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl AssetGateway for GatewayClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError> {
        let url = self.endpoint(SEARCH_PATH);
        debug!(expression = %query.expression, cursor = ?query.cursor, "Searching gateway");

        let response: SearchResponse = self
            .send_json(&url, |client| client.post(&url).json(query))
            .await?;

        debug!(count = response.resources.len(), total = response.total_count, "Search page received");
        Ok(response)
    }

    async fn batch_delete(&self, remote_ids: &[String]) -> Result<BatchDeleteResponse, ApiError> {
        if remote_ids.is_empty() {
            return Ok(BatchDeleteResponse::default());
        }

        let url = self.endpoint(DELETE_PATH);
        let body = BatchDeleteRequest { public_ids: remote_ids };
        debug!(count = remote_ids.len(), "Sending batch delete");

        let response: BatchDeleteResponse = self
            .send_json(&url, |client| client.delete(&url).json(&body))
            .await?;

        Ok(response.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = GatewayClient::new("https://api.example.com/v1_1/demo/").unwrap();
        assert_eq!(
            client.endpoint(SEARCH_PATH),
            "https://api.example.com/v1_1/demo/resources/search"
        );
    }

    #[test]
    fn test_auth_headers_require_token() {
        let mut client = GatewayClient::new("https://api.example.com").unwrap();
        assert!(matches!(client.auth_headers(), Err(ApiError::MissingCredential)));

        client.set_token(Arc::new(String::new()));
        assert!(matches!(client.auth_headers(), Err(ApiError::MissingCredential)));

        client.set_token(Arc::new("abc".to_string()));
        let headers = client.auth_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
    }

    #[tokio::test]
    async fn test_search_without_token_fails_before_network() {
        // Unroutable base URL: a request attempt would surface as a network error
        let client = GatewayClient::new("http://127.0.0.1:9").unwrap();
        let err = client
            .search(&SearchQuery::folder("portfolios", 10))
            .await
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn test_batch_delete_empty_is_noop() {
        let client = GatewayClient::new("http://127.0.0.1:9").unwrap();
        let resp = client.batch_delete(&[]).await.unwrap();
        assert_eq!(resp, BatchDeleteResponse::default());
    }
}
