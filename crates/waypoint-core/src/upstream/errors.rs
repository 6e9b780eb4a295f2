use thiserror::Error;

use super::health::AttemptOutcome;

/// Which side of a dual-source resolution produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Primary,
    Fallback,
}

impl SourceKind {
    /// Returns a static string representation for headers and metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when talking to redundant endpoints.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Attempt exceeded the per-attempt deadline.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish a connection or the transport broke mid-exchange.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP-level error occurred (non-2xx status code).
    ///
    /// First field is the HTTP status code, second is the (truncated) body.
    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    /// A successful response body could not be decoded into the requested type.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request could not be built (bad path, unusable base URL).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every candidate endpoint of a service failed within a single call.
    #[error("All {attempts} endpoint attempt(s) for service '{service}' failed; last error: {last}")]
    AllEndpointsFailed {
        service: String,
        attempts: usize,
        #[source]
        last: Box<UpstreamError>,
    },

    /// Both sources of a dual-source call completed without a usable answer.
    #[error("No usable source: primary {primary}; fallback {fallback}")]
    NoUsableSource { primary: String, fallback: String },

    /// No service with this name is registered.
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// No dual-source pair with this name is configured.
    #[error("Unknown dual-source pair: {0}")]
    UnknownDualSource(String),

    /// A service was registered without endpoints.
    #[error("Service '{0}' has no endpoints")]
    NoEndpoints(String),

    /// A resolver branch task panicked or was aborted before producing a result.
    #[error("Source task failed: {0}")]
    SourceTaskFailed(String),
}

impl UpstreamError {
    /// Maps a per-endpoint failure to the outcome recorded in health history.
    ///
    /// Returns `None` for errors that are not attributable to a single endpoint attempt.
    #[must_use]
    pub fn outcome(&self) -> Option<AttemptOutcome> {
        match self {
            Self::Timeout => Some(AttemptOutcome::Timeout),
            Self::HttpError(..) => Some(AttemptOutcome::HttpError),
            Self::ConnectionFailed(_) => Some(AttemptOutcome::TransportError),
            _ => None,
        }
    }

    /// Returns `true` if trying the next candidate endpoint may succeed.
    ///
    /// Every failure attributable to a single endpoint is recoverable by failover.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.outcome().is_some()
    }

    /// Returns `true` if this error exhausted a whole call (all endpoints or both sources).
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::AllEndpointsFailed { .. } | Self::NoUsableSource { .. })
    }

    /// Returns the HTTP status carried by this error, looking through `AllEndpointsFailed`.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError(status, _) => Some(*status),
            Self::AllEndpointsFailed { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Returns a static string representation for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) => "transport_error",
            Self::HttpError(..) => "http_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::InvalidRequest(_) => "invalid_request",
            Self::AllEndpointsFailed { .. } => "all_endpoints_failed",
            Self::NoUsableSource { .. } => "no_usable_source",
            Self::UnknownService(_) => "unknown_service",
            Self::UnknownDualSource(_) => "unknown_dual_source",
            Self::NoEndpoints(_) => "no_endpoints",
            Self::SourceTaskFailed(_) => "source_task_failed",
        }
    }
}
