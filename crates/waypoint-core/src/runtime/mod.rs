//! Runtime initialization and lifecycle management.
//!
//! Wires the registry, executor, resolver, prober and cache together from an
//! [`AppConfig`](crate::config::AppConfig), for both the HTTP gateway and
//! embedded use. Owns the prober task and coordinates graceful shutdown.
//!
//! # Examples
//!
//! ## Gateway
//!
//! ```no_run
//! use waypoint_core::{config::AppConfig, runtime::WaypointRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!
//!     let runtime = WaypointRuntime::builder().with_config(config).enable_prober().build()?;
//!
//!     // ... set up HTTP routes over runtime.components() ...
//!
//!     runtime.wait_for_shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Embedded
//!
//! ```no_run
//! use waypoint_core::{config::AppConfig, runtime::WaypointRuntime, types::ServiceRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = WaypointRuntime::builder().with_config(AppConfig::load()?).build()?;
//!
//!     let response = runtime.executor().execute("indexer", &ServiceRequest::get("/blocks")).await?;
//!     println!("{} bytes from {}", response.body.len(), response.endpoint);
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod components;
pub mod lifecycle;

pub use builder::{RuntimeError, WaypointRuntimeBuilder};
pub use components::WaypointComponents;
pub use lifecycle::WaypointRuntime;
