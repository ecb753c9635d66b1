//! Network resource definitions
//!
//! Typed fragments of the Gateway API resources the graph links together.

pub mod gateway_api;
