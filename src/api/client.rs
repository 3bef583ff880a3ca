//! OKX REST API client implementation.
//!
//! [`OkxApiClient`] is a thin signed-request collaborator: it knows the OKX
//! envelope, signing and retry rules, and leaves endpoint payloads to the
//! caller's own types.
//!
//! # Example
//!
//! ```rust,ignore
//! use okx_stream::api::OkxApiClient;
//! use okx_stream::shared::{Credentials, Endpoint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OkxApiClient::builder(&Endpoint::live())
//!         .credentials(Credentials::new("api-key", "secret", "passphrase"))
//!         .build()?;
//!
//!     let time = client.get_server_time().await?;
//!     println!("Server time: {}", time.ts);
//!
//!     let balances: Vec<serde_json::Value> =
//!         client.get_private("/api/v5/account/balance", &[("ccy", "USDT")]).await?;
//!     println!("{:?}", balances);
//!
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{ApiResponse, ServerTime};
use crate::auth;
use crate::shared::{Credentials, Endpoint, LocalTimeProvider, TimestampProvider};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Server time endpoint.
pub const SERVER_TIME_PATH: &str = "/api/v5/public/time";

/// Retry configuration for the API client.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = disabled)
    pub max_retries: u32,
    /// Base delay before first retry (ms)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (ms)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given max retries.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the base delay in milliseconds.
    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Set the maximum delay in milliseconds.
    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Exponential backoff with jitter: 75-100% of the capped delay.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp_delay = self.base_delay_ms.saturating_mul(1 << attempt.min(10));
        let capped_delay = exp_delay.min(self.max_delay_ms);
        let jitter_range = capped_delay / 4;
        let jitter = rand::random::<u64>() % (jitter_range + 1);
        Duration::from_millis(capped_delay - jitter_range + jitter)
    }
}

/// Builder for configuring [`OkxApiClient`].
#[derive(Clone)]
pub struct OkxApiClientBuilder {
    base_url: String,
    simulated: bool,
    timeout: Duration,
    default_headers: Vec<(String, String)>,
    retry_config: RetryConfig,
    credentials: Option<Credentials>,
    time: Arc<dyn TimestampProvider>,
}

impl OkxApiClientBuilder {
    /// Create a new builder targeting `endpoint`'s REST URL.
    pub fn new(endpoint: &Endpoint) -> Self {
        Self {
            base_url: endpoint.rest_url().trim_end_matches('/').to_string(),
            simulated: endpoint.is_simulated(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_headers: Vec::new(),
            retry_config: RetryConfig::default(),
            credentials: None,
            time: Arc::new(LocalTimeProvider),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Add a default header to all requests.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Enable retries with exponential backoff.
    ///
    /// # Arguments
    ///
    /// * `config` - Retry configuration (use `RetryConfig::new(3)` for 3 retries with defaults)
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Credentials for private endpoints.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Clock used for `OK-ACCESS-TIMESTAMP`.
    pub fn with_timestamp_provider(mut self, provider: Arc<dyn TimestampProvider>) -> Self {
        self.time = provider;
        self
    }

    /// Build the client.
    pub fn build(self) -> ApiResult<OkxApiClient> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        for (name, value) in self.default_headers {
            let header_name = reqwest::header::HeaderName::try_from(name.as_str())
                .map_err(|e| ApiError::InvalidParameter(format!("Invalid header name '{}': {}", name, e)))?;
            let header_value = reqwest::header::HeaderValue::from_str(&value)
                .map_err(|e| ApiError::InvalidParameter(format!("Invalid header value for '{}': {}", name, e)))?;
            headers.insert(header_name, header_value);
        }

        let http_client = Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(10)
            .default_headers(headers)
            .build()?;

        Ok(OkxApiClient {
            http_client,
            base_url: self.base_url,
            simulated: self.simulated,
            retry_config: self.retry_config,
            credentials: self.credentials,
            time: self.time,
        })
    }
}

impl fmt::Debug for OkxApiClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OkxApiClientBuilder")
            .field("base_url", &self.base_url)
            .field("simulated", &self.simulated)
            .field("timeout", &self.timeout)
            .field("retry_config", &self.retry_config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// OKX REST API client.
#[derive(Clone)]
pub struct OkxApiClient {
    http_client: Client,
    base_url: String,
    simulated: bool,
    retry_config: RetryConfig,
    credentials: Option<Credentials>,
    time: Arc<dyn TimestampProvider>,
}

impl OkxApiClient {
    /// Create a public-only client for `endpoint` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(endpoint: &Endpoint) -> ApiResult<Self> {
        OkxApiClientBuilder::new(endpoint).build()
    }

    /// Create a new client builder for custom configuration.
    pub fn builder(endpoint: &Endpoint) -> OkxApiClientBuilder {
        OkxApiClientBuilder::new(endpoint)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// `GET /api/v5/public/time`
    pub async fn get_server_time(&self) -> ApiResult<ServerTime> {
        let times: Vec<ServerTime> = self.get_public(SERVER_TIME_PATH, &[]).await?;
        times
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Deserialize("empty server time response".to_string()))
    }

    /// Unsigned GET. Returns the envelope's `data`.
    pub async fn get_public<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<T> {
        let request_path = Self::request_path(path, query)?;
        let url = format!("{}{}", self.base_url, request_path);
        self.execute_with_retry(|| Ok(self.with_simulated(self.http_client.get(&url))))
            .await
    }

    /// Signed GET. Returns the envelope's `data`.
    pub async fn get_private<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<T> {
        let credentials = self.require_credentials()?;
        let request_path = Self::request_path(path, query)?;
        let url = format!("{}{}", self.base_url, request_path);
        self.execute_with_retry(|| {
            self.signed(self.http_client.get(&url), credentials, Method::GET, &request_path, "")
        })
        .await
    }

    /// Signed POST with a JSON body. Returns the envelope's `data`.
    pub async fn post_private<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        let credentials = self.require_credentials()?;
        let body = serde_json::to_string(body)
            .map_err(|e| ApiError::InvalidParameter(format!("Failed to serialize body: {}", e)))?;
        let url = format!("{}{}", self.base_url, path);
        self.execute_with_retry(|| {
            let request = self.http_client.post(&url).body(body.clone());
            self.signed(request, credentials, Method::POST, path, &body)
        })
        .await
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn require_credentials(&self) -> ApiResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ApiError::Unauthorized("credentials required for private endpoint".to_string()))
    }

    fn request_path(path: &str, query: &[(&str, &str)]) -> ApiResult<String> {
        if !path.starts_with('/') {
            return Err(ApiError::InvalidParameter(format!("path must start with '/': {}", path)));
        }
        if query.is_empty() {
            return Ok(path.to_string());
        }
        let query = serde_urlencoded::to_string(query)
            .map_err(|e| ApiError::InvalidParameter(e.to_string()))?;
        Ok(format!("{}?{}", path, query))
    }

    fn with_simulated(&self, request: RequestBuilder) -> RequestBuilder {
        if self.simulated {
            request.header(crate::network::SIMULATED_TRADING_HEADER, "1")
        } else {
            request
        }
    }

    /// Attach fresh `OK-ACCESS-*` headers. Called once per attempt so retries
    /// never reuse a stale timestamp.
    fn signed(
        &self,
        request: RequestBuilder,
        credentials: &Credentials,
        method: Method,
        request_path: &str,
        body: &str,
    ) -> ApiResult<RequestBuilder> {
        let timestamp = self.time.timestamp_iso();
        let headers = auth::rest_headers(
            credentials,
            &timestamp,
            method.as_str(),
            request_path,
            body,
            self.simulated,
        )?;
        Ok(headers
            .into_iter()
            .fold(request, |request, (name, value)| request.header(name, value)))
    }

    /// Execute a request with retry logic.
    async fn execute_with_retry<T, F>(&self, build_request: F) -> ApiResult<T>
    where
        F: Fn() -> ApiResult<RequestBuilder>,
        T: DeserializeOwned,
    {
        let mut attempt = 0;

        loop {
            let result = build_request()?.send().await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let text = response.text().await?;
                        return Self::parse_envelope(&text);
                    }

                    let error = Self::parse_error_response(response).await;

                    if attempt < self.retry_config.max_retries && Self::is_retryable_status(status) {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max_retries = self.retry_config.max_retries,
                            delay_ms = delay.as_millis(),
                            status = %status,
                            "Retrying request after error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(error);
                }
                Err(e) => {
                    let is_retryable = e.is_connect() || e.is_timeout();

                    if attempt < self.retry_config.max_retries && is_retryable {
                        let delay = self.retry_config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max_retries = self.retry_config.max_retries,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "Retrying request after network error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(ApiError::Http(e));
                }
            }
        }
    }

    /// Decode the envelope and return `data`, or the envelope's error.
    fn parse_envelope<T: DeserializeOwned>(text: &str) -> ApiResult<T> {
        let envelope: ApiResponse<Value> = serde_json::from_str(text)
            .map_err(|e| ApiError::Deserialize(format!("Failed to deserialize response: {}", e)))?;

        if !envelope.is_success() {
            return Err(ApiError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }

        serde_json::from_value(envelope.data)
            .map_err(|e| ApiError::Deserialize(format!("Failed to deserialize data: {}", e)))
    }

    /// Parse an error response into an ApiError.
    async fn parse_error_response(response: reqwest::Response) -> ApiError {
        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to read error response body: {}", e);
                format!("HTTP {} (body unreadable: {})", status, e)
            }
        };
        Self::map_status_error(status, text)
    }

    /// Map HTTP status code to ApiError. OKX usually explains a 4xx with an
    /// envelope, which wins over the bare status.
    fn map_status_error(status: StatusCode, text: String) -> ApiError {
        let envelope = serde_json::from_str::<ApiResponse<Value>>(&text).ok();
        let message = envelope
            .as_ref()
            .map(|e| e.msg.clone())
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| text.clone());

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(message),
            _ if status.is_server_error() => ApiError::ServerError(message),
            _ => match envelope {
                Some(envelope) if !envelope.is_success() => ApiError::Api {
                    code: envelope.code,
                    msg: envelope.msg,
                },
                _ => ApiError::UnexpectedStatus(status.as_u16(), message),
            },
        }
    }

    /// Check if a status code is retryable.
    fn is_retryable_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }
}

impl fmt::Debug for OkxApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OkxApiClient")
            .field("base_url", &self.base_url)
            .field("simulated", &self.simulated)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
