//! Request and response types shared by the executor, resolver and transports.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::upstream::errors::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A request against a logical service, independent of which endpoint serves it.
///
/// `path` is appended to the chosen endpoint's base URL; it may carry a query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Bytes>,
}

impl ServiceRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: HttpMethod::Get, path: path.into(), body: None }
    }

    /// Builds a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidRequest`] if `body` cannot be serialized.
    pub fn post_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self, UpstreamError> {
        let body = serde_json::to_vec(body)
            .map_err(|e| UpstreamError::InvalidRequest(format!("body serialization: {e}")))?;
        Ok(Self { method: HttpMethod::Post, path: path.into(), body: Some(Bytes::from(body)) })
    }

    /// Cache key for this request against `service`.
    #[must_use]
    pub fn cache_key(&self, service: &str) -> String {
        match &self.body {
            None => format!("{service}:{}:{}", self.method.as_str(), self.path),
            Some(body) => format!(
                "{service}:{}:{}:{}",
                self.method.as_str(),
                self.path,
                String::from_utf8_lossy(body)
            ),
        }
    }
}

/// A successful (2xx) response from one endpoint.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Bytes,
    /// Base URL of the endpoint that served the response.
    pub endpoint: Arc<str>,
    pub latency_ms: u64,
}

impl ServiceResponse {
    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidResponse`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, UpstreamError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| UpstreamError::InvalidResponse(format!("{}: {e}", self.endpoint)))
    }
}

/// Joins an endpoint base URL and a request path with exactly one slash between them.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') || path.starts_with('?') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
