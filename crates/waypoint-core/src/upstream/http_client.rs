use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Semaphore;

use crate::{
    types::{join_url, HttpMethod, ServiceRequest, ServiceResponse},
    upstream::UpstreamError,
};

/// Maximum number of response body bytes kept in an [`UpstreamError::HttpError`].
const MAX_ERROR_BODY: usize = 256;

/// Performs a single exchange with one endpoint.
///
/// Implementations must not retry internally: failover across endpoints is the
/// executor's job, and every attempt has to be visible to health tracking.
/// Only 2xx responses are `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        base_url: &str,
        request: &ServiceRequest,
        timeout: Duration,
    ) -> Result<ServiceResponse, UpstreamError>;
}

/// Configuration for HTTP client pooling and concurrency.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent outbound requests
    pub concurrent_limit: usize,
    /// How long to wait for a concurrency permit before failing the attempt
    pub permit_timeout_ms: u64,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 256,
            permit_timeout_ms: 500,
            connect_timeout_ms: 3_000,
            user_agent: concat!("waypoint/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// reqwest-backed [`Transport`] with semaphore-based concurrency control.
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    config: HttpClientConfig,
}

// Default is not implemented because building the reqwest client can fail.

impl HttpClient {
    /// Creates a new HTTP client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Creates a new HTTP client with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, UpstreamError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::limited(3))
            .user_agent(config.user_agent.clone())
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                UpstreamError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit.max(1))),
            config,
        })
    }

    /// Sanitizes network errors so that internal addresses do not leak into diagnostics.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else if error.is_redirect() {
            "too many redirects".to_string()
        } else {
            "network error".to_string()
        }
    }

    fn map_send_error(error: &reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::ConnectionFailed(Self::sanitize_network_error(error))
        }
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}

#[async_trait]
impl Transport for HttpClient {
    /// Sends one request under `timeout`.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::Timeout`] if the permit wait or the request times out
    /// - [`UpstreamError::HttpError`] for non-success HTTP status codes
    /// - [`UpstreamError::ConnectionFailed`] for network-related failures
    /// - [`UpstreamError::InvalidRequest`] if the joined URL does not parse
    async fn send(
        &self,
        base_url: &str,
        request: &ServiceRequest,
        timeout: Duration,
    ) -> Result<ServiceResponse, UpstreamError> {
        let url = join_url(base_url, &request.path);
        let parsed = url::Url::parse(&url)
            .map_err(|e| UpstreamError::InvalidRequest(format!("{url}: {e}")))?;

        let _permit = tokio::time::timeout(
            Duration::from_millis(self.config.permit_timeout_ms),
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                endpoint = base_url,
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            UpstreamError::Timeout
        })?
        .map_err(|_| UpstreamError::ConnectionFailed("http client closed".to_string()))?;

        let builder = match request.method {
            HttpMethod::Get => self.client.get(parsed),
            HttpMethod::Post => self.client.post(parsed).header("content-type", "application/json"),
        };
        let builder = match &request.body {
            // Bytes::clone is a reference count bump
            Some(body) => builder.body(body.clone()),
            None => builder,
        };

        let started = Instant::now();
        let response = builder.timeout(timeout).send().await.map_err(|e| {
            tracing::trace!(endpoint = base_url, error = %e, "http request error");
            Self::map_send_error(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let raw_text = response.text().await.unwrap_or_default();
            let sanitized_text = if raw_text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !raw_text.is_char_boundary(cut) {
                    cut -= 1;
                }
                format!("{}... (truncated)", &raw_text[..cut])
            } else {
                raw_text
            };
            tracing::trace!(endpoint = base_url, status = status.as_u16(), "http request failed");
            return Err(UpstreamError::HttpError(status.as_u16(), sanitized_text));
        }

        let body = response.bytes().await.map_err(|e| Self::map_send_error(&e))?;

        Ok(ServiceResponse {
            status: status.as_u16(),
            body,
            endpoint: Arc::from(base_url),
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}
