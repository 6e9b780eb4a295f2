//! Dual-source race and fallback.
//!
//! The same logical query goes to two independently sourced services at once
//! (typically an indexing aggregator and a chain node). The first *usable*
//! answer wins. A branch that loses keeps running detached: its result is
//! dropped, but the health updates it makes along the way still land.

use serde::de::DeserializeOwned;
use std::{future::Future, sync::Arc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use super::{
    errors::{SourceKind, UpstreamError},
    executor::RequestExecutor,
};
use crate::{metrics::MetricsCollector, types::ServiceRequest};

/// A value together with the source that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: SourceKind,
}

enum Finished<T> {
    Primary(T),
    Fallback(T),
}

type BranchResult<T> = Result<Result<T, UpstreamError>, JoinError>;

fn flatten<T>(joined: BranchResult<T>) -> Result<T, UpstreamError> {
    joined.map_err(|e| UpstreamError::SourceTaskFailed(e.to_string()))?
}

fn rejection<T>(result: &Result<T, UpstreamError>) -> String {
    match result {
        Ok(_) => "response not usable".to_string(),
        Err(e) => e.to_string(),
    }
}

/// Runs both fetches concurrently and returns the first usable result.
///
/// If the first branch to finish is usable it is returned immediately and the
/// other branch is detached. Otherwise the second branch is awaited and
/// returned if usable. Which branch finishes first does not change the answer
/// when exactly one of them is usable.
///
/// # Errors
///
/// Returns [`UpstreamError::NoUsableSource`] when both branches completed and
/// neither produced a usable value; the error carries both rejection reasons.
pub async fn race_usable<T, P, F, U>(
    primary: P,
    fallback: F,
    is_usable: U,
) -> Result<Resolved<T>, UpstreamError>
where
    T: Send + 'static,
    P: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    F: Future<Output = Result<T, UpstreamError>> + Send + 'static,
    U: Fn(&T) -> bool,
{
    let mut primary: JoinHandle<Result<T, UpstreamError>> = tokio::spawn(primary);
    let mut fallback: JoinHandle<Result<T, UpstreamError>> = tokio::spawn(fallback);

    let finished = tokio::select! {
        joined = &mut primary => Finished::Primary(joined),
        joined = &mut fallback => Finished::Fallback(joined),
    };

    let (first_source, first, second_source, second) = match finished {
        Finished::Primary(joined) => (SourceKind::Primary, joined, SourceKind::Fallback, fallback),
        Finished::Fallback(joined) => (SourceKind::Fallback, joined, SourceKind::Primary, primary),
    };

    let first = match flatten(first) {
        Ok(value) if is_usable(&value) => {
            // Dropping the handle detaches the other branch without cancelling it.
            drop(second);
            return Ok(Resolved { value, source: first_source });
        }
        other => other,
    };

    if first.is_ok() {
        debug!(source = %first_source, "first source answered but is not usable");
    } else {
        debug!(source = %first_source, "first source failed, awaiting the other");
    }
    await_second(first, first_source, second, second_source, is_usable).await
}

async fn await_second<T, U>(
    first: Result<T, UpstreamError>,
    first_source: SourceKind,
    second: JoinHandle<Result<T, UpstreamError>>,
    second_source: SourceKind,
    is_usable: U,
) -> Result<Resolved<T>, UpstreamError>
where
    U: Fn(&T) -> bool,
{
    let second = flatten(second.await);
    match second {
        Ok(value) if is_usable(&value) => Ok(Resolved { value, source: second_source }),
        second => {
            let (primary, fallback) = match first_source {
                SourceKind::Primary => (rejection(&first), rejection(&second)),
                SourceKind::Fallback => (rejection(&second), rejection(&first)),
            };
            Err(UpstreamError::NoUsableSource { primary, fallback })
        }
    }
}

/// Resolves queries against two registered services through a shared executor.
pub struct DualSourceResolver {
    executor: Arc<RequestExecutor>,
    metrics: Arc<MetricsCollector>,
}

impl DualSourceResolver {
    #[must_use]
    pub fn new(executor: Arc<RequestExecutor>, metrics: Arc<MetricsCollector>) -> Self {
        Self { executor, metrics }
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// Sends the same request to both services and returns the first usable decoded body.
    ///
    /// Each branch goes through the executor, so each may fail over within its
    /// own endpoint set before reporting.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::UnknownService`] if either service is not registered
    /// - [`UpstreamError::NoUsableSource`] if neither branch produced a usable value
    pub async fn resolve<T, U>(
        &self,
        primary_service: &str,
        fallback_service: &str,
        request: &ServiceRequest,
        is_usable: U,
    ) -> Result<Resolved<T>, UpstreamError>
    where
        T: DeserializeOwned + Send + 'static,
        U: Fn(&T) -> bool,
    {
        self.resolve_split(primary_service, request, fallback_service, request, is_usable).await
    }

    /// Like [`resolve`](Self::resolve), with a different request per source.
    ///
    /// Aggregators and chain nodes rarely share URL layouts, so most real pairs
    /// need this form.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub async fn resolve_split<T, U>(
        &self,
        primary_service: &str,
        primary_request: &ServiceRequest,
        fallback_service: &str,
        fallback_request: &ServiceRequest,
        is_usable: U,
    ) -> Result<Resolved<T>, UpstreamError>
    where
        T: DeserializeOwned + Send + 'static,
        U: Fn(&T) -> bool,
    {
        let registry = self.executor.registry();
        registry.service(primary_service)?;
        registry.service(fallback_service)?;

        let primary = self.fetch::<T>(primary_service, primary_request);
        let fallback = self.fetch::<T>(fallback_service, fallback_request);
        let result = race_usable(primary, fallback, is_usable).await;

        let pair = format!("{primary_service}|{fallback_service}");
        match &result {
            Ok(resolved) => {
                self.metrics.record_resolution(&pair, Some(resolved.source));
                debug!(pair = %pair, source = %resolved.source, "dual-source resolved");
            }
            Err(e) => {
                self.metrics.record_resolution(&pair, None);
                warn!(pair = %pair, error = %e, "no usable source");
            }
        }
        result
    }

    fn fetch<T>(
        &self,
        service: &str,
        request: &ServiceRequest,
    ) -> impl Future<Output = Result<T, UpstreamError>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let executor = Arc::clone(&self.executor);
        let service = service.to_string();
        let request = request.clone();
        async move { executor.execute_json::<T>(&service, &request).await }
    }
}
