pub mod auth;
pub mod models;

pub use auth::AuthContext;
pub use models::{ApiResponse, Envelope};
pub use reqwest::Method;

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ApiConfig, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("API Error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Decode Error: {0}")]
    Decode(String),
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Client Error: {0}")]
    Client(String),
}

impl ApiError {
    /// Transport failures and 408/429/5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            ApiError::Decode(_) | ApiError::Rejected(_) | ApiError::Client(_) => false,
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// JSON client for the site backend.
///
/// Cheap to clone; clones share the connection pool and the [`AuthContext`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    auth: AuthContext,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, auth: AuthContext) -> Result<Self, ApiError> {
        Self::build(&config.base_url, Duration::from_secs(config.timeout_secs), auth)
    }

    pub fn with_base_url(base_url: impl Into<String>, auth: AuthContext) -> Result<Self, ApiError> {
        Self::build(&base_url.into(), Duration::from_secs(DEFAULT_TIMEOUT_SECS), auth)
    }

    fn build(base_url: &str, timeout: Duration, auth: AuthContext) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Issues one request and normalises every failure into the returned
    /// [`ApiResponse`]. No retries happen here.
    pub async fn request<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        match self.try_request(method.clone(), endpoint, body).await {
            Ok(envelope) => ApiResponse::from_envelope(envelope),
            Err(e) => {
                warn!(%method, endpoint, error = %e, "API request failed");
                ApiResponse::from_error(e)
            }
        }
    }

    async fn try_request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self
            .client
            .request(method.clone(), self.url(endpoint))
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = self.auth.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::from_reqwest)?;
        let status = response.status();
        let text = response.text().await.map_err(ApiError::from_reqwest)?;
        debug!(%method, endpoint, status = status.as_u16(), "API response received");

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&text).unwrap_or_else(|| status.to_string()),
            });
        }

        if text.trim().is_empty() {
            return Ok(Envelope {
                success: true,
                data: None,
                message: None,
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        self.request::<T, ()>(Method::GET, endpoint, None).await
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        self.request::<T, ()>(Method::DELETE, endpoint, None).await
    }
}

/// Pulls a human readable message out of an error body, if it is JSON.
fn error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(ApiError::Status { status: 503, message: String::new() }.is_retryable());
        assert!(ApiError::Status { status: 429, message: String::new() }.is_retryable());
        assert!(!ApiError::Status { status: 400, message: String::new() }.is_retryable());
        assert!(!ApiError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn error_message_prefers_message_then_error() {
        assert_eq!(error_message(r#"{"message":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message(r#"{"error":"bad"}"#).as_deref(), Some("bad"));
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn timeout_comes_from_config_or_the_shared_default() {
        let client = ApiClient::with_base_url("http://localhost:8080", AuthContext::in_memory()).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let config = ApiConfig {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 5,
            token_file: None,
        };
        let client = ApiClient::new(&config, AuthContext::in_memory()).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn joins_base_url_and_endpoint() {
        let client = ApiClient::with_base_url("http://localhost:8080/api/", AuthContext::in_memory()).unwrap();
        assert_eq!(client.url("/chat/message"), "http://localhost:8080/api/chat/message");
        assert_eq!(client.url("admin/pages"), "http://localhost:8080/api/admin/pages");
    }
}
