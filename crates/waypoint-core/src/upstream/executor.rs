//! Retrying request executor.
//!
//! One call walks the candidate list produced by selection at the moment the
//! call starts. Each attempt runs under the same fixed deadline; a failure is
//! recorded against the endpoint, followed by a fixed pause before the next
//! candidate. There is no backoff growth within a call: repeated trouble is
//! handled by quarantine across calls instead.

use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{
    endpoint::Endpoint,
    errors::UpstreamError,
    health::AttemptOutcome,
    http_client::Transport,
    registry::Registry,
    selection::select_candidates,
};
use crate::{
    metrics::MetricsCollector,
    types::{ServiceRequest, ServiceResponse},
};

/// Timing knobs shared by every call of an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Deadline applied to every single attempt.
    pub attempt_timeout: Duration,
    /// Pause between a failed attempt and the next candidate.
    pub retry_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { attempt_timeout: Duration::from_secs(8), retry_delay: Duration::from_millis(250) }
    }
}

/// One attempt against one endpoint. Lives only for the duration of the attempt.
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub endpoint: Arc<str>,
    pub started_at: Instant,
    pub deadline: Instant,
    pub outcome: Option<AttemptOutcome>,
}

impl RequestAttempt {
    #[must_use]
    pub fn start(endpoint: Arc<str>, timeout: Duration) -> Self {
        let started_at = Instant::now();
        Self { endpoint, started_at, deadline: started_at + timeout, outcome: None }
    }

    /// Marks the attempt finished and returns its latency.
    pub fn finish(&mut self, outcome: AttemptOutcome) -> Duration {
        self.outcome = Some(outcome);
        self.started_at.elapsed()
    }
}

/// Issues requests against a logical service with per-endpoint failover.
///
/// Holds no state of its own besides the shared registry, so a single instance
/// can serve any number of concurrent calls.
pub struct RequestExecutor {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    config: ExecutorConfig,
    metrics: Arc<MetricsCollector>,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        config: ExecutorConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { registry, transport, config, metrics }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes `request` against the named service.
    ///
    /// Returns the first 2xx response. Candidates are tried in selection order;
    /// the order is fixed for the whole call even if health changes meanwhile.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::UnknownService`] if `service` is not registered
    /// - [`UpstreamError::InvalidRequest`] if the request cannot be sent anywhere
    /// - [`UpstreamError::AllEndpointsFailed`] carrying the last error when every
    ///   candidate failed
    pub async fn execute(
        &self,
        service: &str,
        request: &ServiceRequest,
    ) -> Result<ServiceResponse, UpstreamError> {
        let service = self.registry.service(service)?;
        let candidates = select_candidates(&service);
        let total = candidates.len();
        let mut last_error = None;

        for (index, endpoint) in candidates.iter().enumerate() {
            let attempt =
                self.attempt(service.name(), endpoint, request, self.config.attempt_timeout);
            match attempt.await {
                Ok(response) => return Ok(response),
                Err(error) if error.outcome().is_none() => return Err(error),
                Err(error) => last_error = Some(error),
            }

            if index + 1 < total {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        self.metrics.record_exhausted(service.name());
        warn!(
            service = %service.name(),
            attempts = total,
            "all endpoints failed"
        );
        let last = last_error
            .unwrap_or_else(|| UpstreamError::NoEndpoints(service.name().to_string()));
        Err(UpstreamError::AllEndpointsFailed {
            service: service.name().to_string(),
            attempts: total,
            last: Box::new(last),
        })
    }

    /// Executes `request` and decodes the JSON body.
    ///
    /// Decoding happens after the endpoint already succeeded, so a decode failure
    /// does not count against its health.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute), plus [`UpstreamError::InvalidResponse`]
    /// when the body does not decode into `T`.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        service: &str,
        request: &ServiceRequest,
    ) -> Result<T, UpstreamError> {
        self.execute(service, request).await?.json()
    }

    /// Performs one attempt against one endpoint under `timeout` and records the outcome.
    ///
    /// Shared by calls and by the background prober, so that both feed health the same way.
    pub(crate) async fn attempt(
        &self,
        service: &str,
        endpoint: &Endpoint,
        request: &ServiceRequest,
        timeout: Duration,
    ) -> Result<ServiceResponse, UpstreamError> {
        let policy = self.registry.policy();
        let mut attempt = RequestAttempt::start(endpoint.url().clone(), timeout);

        let result = match tokio::time::timeout_at(
            attempt.deadline,
            self.transport.send(endpoint.url(), request, timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout),
        };

        match result {
            Ok(response) => {
                let latency = attempt.finish(AttemptOutcome::Success);
                endpoint.record_success(latency, policy);
                self.metrics.record_attempt(service, endpoint.url(), AttemptOutcome::Success, latency);
                debug!(
                    service = %service,
                    endpoint = %endpoint.url(),
                    latency_ms = latency.as_millis() as u64,
                    status = response.status,
                    "attempt succeeded"
                );
                Ok(response)
            }
            Err(error) => {
                let Some(outcome) = error.outcome() else {
                    return Err(error);
                };
                let latency = attempt.finish(outcome);
                if endpoint.record_failure(outcome, Some(error.to_string()), policy) {
                    self.metrics.record_quarantine(service, endpoint.url());
                }
                self.metrics.record_attempt(service, endpoint.url(), outcome, latency);
                warn!(
                    service = %service,
                    endpoint = %endpoint.url(),
                    outcome = outcome.as_str(),
                    error = %error,
                    "attempt failed"
                );
                Err(error)
            }
        }
    }
}
