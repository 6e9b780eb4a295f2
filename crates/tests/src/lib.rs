//! Integration tests for waypoint.
//!
//! Every test talks to local mockito servers over real HTTP; nothing leaves the
//! machine. Endpoints that must fail point at `127.0.0.1:1`, which refuses
//! connections immediately.
//!
//! - `failover_tests`: executor failover, quarantine and global reset
//! - `prober_tests`: probe rounds, quarantine recovery, the background loop
//! - `dual_source_tests`: first-usable-wins resolution between two services
//! - `revalidation_tests`: stale-while-revalidate through the runtime
//! - `gateway_tests`: the axum gateway with its middleware stack
//! - `runtime_tests`: builder validation and shutdown coordination
//! - `mock_infrastructure`: `RestMockBuilder` and configuration fixtures
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod failover_tests;

#[cfg(test)]
mod prober_tests;

#[cfg(test)]
mod dual_source_tests;

#[cfg(test)]
mod revalidation_tests;

#[cfg(test)]
mod gateway_tests;

#[cfg(test)]
mod runtime_tests;
