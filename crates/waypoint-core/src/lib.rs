//! # Waypoint Core
//!
//! Resilient data access for a blockchain explorer backend. Every external
//! service is reached through a list of interchangeable endpoints, and the
//! library decides which endpoint to use, when to give up on one, and what to
//! show while the network is slow.
//!
//! - **[`upstream`]**: Endpoint registry, health tracking with quarantine and
//!   cooldown, the retrying executor, the background prober and the dual-source
//!   resolver.
//!
//! - **[`cache`]**: Short-TTL stale-while-revalidate cache of last known-good
//!   payloads.
//!
//! - **[`config`]**: TOML and environment configuration with validation.
//!
//! - **[`metrics`]**: Prometheus metrics for attempts, quarantines, resolution
//!   and cache behaviour.
//!
//! - **[`runtime`]**: Composition root that wires the above together and owns
//!   background task lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WaypointRuntime                        │
//! │  ┌──────────────┐  ┌───────────────────┐  ┌───────────────┐  │
//! │  │  Revalidator │  │ DualSourceResolver│  │  HealthProber │  │
//! │  └──────┬───────┘  └─────────┬─────────┘  └───────┬───────┘  │
//! │         │                    │                    │          │
//! │  ┌──────▼───────┐  ┌─────────▼─────────┐          │          │
//! │  │ ResponseCache│  │  RequestExecutor  │◄─────────┘          │
//! │  └──────────────┘  └─────────┬─────────┘                     │
//! │                    ┌─────────▼─────────┐  ┌───────────────┐  │
//! │                    │ Registry + health │  │    Metrics    │  │
//! │                    └───────────────────┘  └───────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod metrics;
pub mod runtime;
pub mod types;
pub mod upstream;
