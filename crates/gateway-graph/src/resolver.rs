//! Reference resolution
//!
//! Resolving never fails: a reference either binds to a fetched identity or
//! comes back as a [`DanglingRef`] the caller records. The resolver is a
//! pure lookup over a snapshot, so the graph builder and the policy resolver
//! treat deleted, never-created and malformed targets the same way.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use gateway_graph_common::{ObjectKey, ObjectRef, ResourceKind};

/// Why a reference did not resolve
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DanglingReason {
    /// No fetched resource has the referenced identity
    NotFound,
    /// A namespaced kind was referenced without a namespace
    MissingNamespace,
    /// The referenced group/kind is never fetched
    UnsupportedKind,
}

impl fmt::Display for DanglingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::MissingNamespace => f.write_str("missing namespace"),
            Self::UnsupportedKind => f.write_str("unsupported kind"),
        }
    }
}

/// A reference that did not resolve, with the original reference kept intact
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingRef {
    /// The reference as declared
    pub reference: ObjectRef,
    /// Why it did not resolve
    pub reason: DanglingReason,
}

impl fmt::Display for DanglingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reference, self.reason)
    }
}

/// Outcome of resolving a reference
#[derive(Debug)]
pub enum ResolvedRef<'a, V> {
    /// The reference names a fetched resource
    Bound {
        /// Identity of the resource
        key: &'a ObjectKey,
        /// The resource
        value: &'a V,
    },
    /// The reference names nothing in the snapshot
    Dangling(DanglingRef),
}

impl<'a, V> ResolvedRef<'a, V> {
    /// Identity of the bound resource, if any
    pub fn key(&self) -> Option<&'a ObjectKey> {
        match self {
            Self::Bound { key, .. } => Some(*key),
            Self::Dangling(_) => None,
        }
    }
}

/// Resolves references against an identity-keyed snapshot
#[derive(Debug)]
pub struct ReferenceResolver<'a, V> {
    snapshot: &'a BTreeMap<ObjectKey, V>,
}

impl<'a, V> Clone for ReferenceResolver<'a, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, V> Copy for ReferenceResolver<'a, V> {}

impl<'a, V> ReferenceResolver<'a, V> {
    /// Create a resolver over a snapshot
    pub fn new(snapshot: &'a BTreeMap<ObjectKey, V>) -> Self {
        Self { snapshot }
    }

    /// Resolve a reference
    ///
    /// The namespace of cluster-scoped kinds is ignored; namespaced kinds
    /// must carry one. Section names never affect resolution, they only
    /// narrow what a policy applies to.
    pub fn resolve(&self, reference: &ObjectRef) -> ResolvedRef<'a, V> {
        let dangling = |reason| {
            ResolvedRef::Dangling(DanglingRef {
                reference: reference.clone(),
                reason,
            })
        };

        if matches!(reference.kind, ResourceKind::Other(_)) {
            return dangling(DanglingReason::UnsupportedKind);
        }
        if !reference.kind.is_cluster_scoped() && reference.namespace.is_empty() {
            return dangling(DanglingReason::MissingNamespace);
        }

        match self.snapshot.get_key_value(&reference.key()) {
            Some((key, value)) => ResolvedRef::Bound { key, value },
            None => dangling(DanglingReason::NotFound),
        }
    }
}
