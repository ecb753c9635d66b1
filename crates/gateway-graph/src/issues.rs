//! Diagnostics collected during a discovery pass
//!
//! None of these abort discovery. They are returned next to the graph so a
//! presentation layer can show them in their own section.

use serde::Serialize;

use gateway_graph_common::{ObjectKey, ObjectRef, ResourceKind};

use crate::resolver::{DanglingReason, DanglingRef};

/// A graph-integrity problem
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StructuralError {
    /// More than one fetched record had the same identity
    #[serde(rename_all = "camelCase")]
    DuplicateIdentity {
        /// The shared identity
        key: ObjectKey,
        /// How many records carried it (at least 2)
        occurrences: usize,
    },
    /// A parentage cycle; its members and their descendants get no policies
    #[serde(rename_all = "camelCase")]
    Cycle {
        /// Identities on the cycle, sorted
        participants: Vec<ObjectKey>,
    },
}

/// A declared reference that did not resolve
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingReference {
    /// The resource that declared the reference
    pub from: ObjectKey,
    /// The unresolved reference
    pub reference: DanglingRef,
}

/// A policy whose target does not resolve
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedPolicy {
    /// The policy
    pub policy: ObjectKey,
    /// Its unresolved target
    pub target: ObjectRef,
    /// Why the target did not resolve
    pub reason: DanglingReason,
}

/// A policy whose target exists but was excluded because of a cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedPolicy {
    /// The policy
    pub policy: ObjectKey,
    /// Its excluded target
    pub target: ObjectKey,
}

/// An object that could not be turned into a record
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRecord {
    /// Kind the object was listed as
    pub kind: ResourceKind,
    /// Namespace, if the object had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Name, if the object had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Parse failure
    pub message: String,
}

/// Every diagnostic produced by one discovery pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issues {
    /// Cycles and duplicate identities
    pub structural_errors: Vec<StructuralError>,
    /// Parent and backend references that did not resolve
    pub dangling_references: Vec<DanglingReference>,
    /// Policies with a dangling target
    pub orphaned_policies: Vec<OrphanedPolicy>,
    /// Policies whose target was excluded from policy resolution
    pub excluded_policies: Vec<ExcludedPolicy>,
    /// Objects that failed to parse
    pub invalid_records: Vec<InvalidRecord>,
}

impl Issues {
    /// Whether the pass produced no diagnostics at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of diagnostics
    pub fn len(&self) -> usize {
        self.structural_errors.len()
            + self.dangling_references.len()
            + self.orphaned_policies.len()
            + self.excluded_policies.len()
            + self.invalid_records.len()
    }
}
