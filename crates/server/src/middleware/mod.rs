//! HTTP middleware for the gateway.

pub mod request_id;

pub use request_id::{request_id_layers, request_span, UuidRequestIdGenerator, X_REQUEST_ID};
