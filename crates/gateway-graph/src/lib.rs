//! Gateway API resource graph and policy attachment resolution
//!
//! A discovery pass lists Gateway API resources and policy objects from an
//! [`ObjectStore`], links them into a [`ResourceGraph`] keyed by identity,
//! and computes for every node the ordered list of policies that apply to it.
//!
//! # Modules
//!
//! - [`records`] - Raw objects parsed into records with declared references
//! - [`store`] - Object store trait, Kubernetes and in-memory stores
//! - [`resolver`] - Reference resolution over a fetched snapshot
//! - [`graph`] - Graph building, duplicate and cycle detection
//! - [`policy`] - Policy attachment and inheritance ordering
//! - [`model`] - The read-only result
//! - [`discovery`] - One fetch-build-resolve pass
//! - [`issues`] - Diagnostics

#![deny(missing_docs)]

pub mod discovery;
pub mod graph;
pub mod issues;
pub mod model;
pub mod policy;
pub mod records;
pub mod resolver;
pub mod store;

pub use discovery::discover;
pub use graph::{GraphBuilder, ResourceGraph, ResourceNode};
pub use issues::Issues;
pub use model::{ModelSummary, PolicyRef, ResourceModel};
pub use policy::{AttachedPolicy, EffectivePolicyIndex, PolicyResolver, Specificity};
pub use records::{PolicyRecord, Record};
pub use resolver::{DanglingReason, DanglingRef, ReferenceResolver, ResolvedRef};
pub use store::{KubeStore, ObjectStore, StaticStore};

pub use gateway_graph_common::{Error, Result};
