//! Common types for gateway-graph: identities, errors, configuration and
//! Kubernetes utilities
//!
//! # Modules
//!
//! - [`resource`] - Resource identities and references
//! - [`network`] - Typed Gateway API spec fragments used for linking
//! - [`config`] - Discovery configuration
//! - [`kube_utils`] - ApiResource building and client creation
//! - [`telemetry`] - Tracing subscriber setup
//! - [`yaml`] - YAML loading for configuration and manifests
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod kube_utils;
pub mod network;
pub mod resource;
pub mod telemetry;
pub mod yaml;

pub use config::{DiscoveryConfig, DuplicatePolicy};
pub use error::Error;
pub use resource::{GroupKind, KindDescriptor, ObjectKey, ObjectRef, PolicyKind, ResourceKind};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
