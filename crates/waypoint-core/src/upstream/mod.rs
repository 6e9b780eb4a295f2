//! Endpoint management for the services an explorer backend depends on.
//!
//! Each logical service (an indexer API, a chain node, a price feed) is backed
//! by an ordered list of interchangeable endpoints. This module covers:
//! - Per-endpoint health tracking and quarantine ([`health`], [`endpoint`])
//! - The service registry and its health snapshot ([`registry`])
//! - Candidate selection with cooldown recovery ([`selection`])
//! - The retrying executor and the background prober
//! - Racing two independently sourced services ([`resolver`])
//!
//! # Call Flow
//!
//! ```text
//! execute(service, request)
//!       │
//!       ▼
//! select_candidates ── cooldown elapsed? ──► eligible again
//!       │               all quarantined?  ──► counters reset
//!       ▼
//! ┌───────────────┐  failure  ┌──────────────┐
//! │ attempt (A)   │ ────────► │ retry_delay  │ ──► attempt (B) ──► ...
//! └──────┬────────┘           └──────────────┘
//!        │ success
//!        ▼
//!  ServiceResponse            (exhausted ──► AllEndpointsFailed)
//! ```

pub mod endpoint;
pub mod errors;
pub mod executor;
pub mod health;
pub mod http_client;
pub mod prober;
pub mod registry;
pub mod resolver;
pub mod selection;
pub mod usability;

pub use endpoint::Endpoint;
pub use errors::{SourceKind, UpstreamError};
pub use executor::{ExecutorConfig, RequestAttempt, RequestExecutor};
pub use health::{
    AttemptOutcome, EndpointSnapshot, HealthPolicy, HealthSnapshot, ServiceSnapshot,
};
pub use http_client::{HttpClient, HttpClientConfig, Transport};
pub use prober::{HealthProber, ProbeReport, ProberConfig};
pub use registry::{Registry, Service};
pub use resolver::{race_usable, DualSourceResolver, Resolved};
pub use selection::select_candidates;
pub use usability::{is_usable_json, non_empty_field};
