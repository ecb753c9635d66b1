//! The finished, read-only result of a discovery pass

use std::collections::BTreeMap;

use serde::Serialize;

use gateway_graph_common::{DuplicatePolicy, ObjectKey, ResourceKind};

use crate::graph::{GraphBuilder, ResourceGraph, ResourceNode};
use crate::issues::{
    DanglingReference, ExcludedPolicy, InvalidRecord, Issues, OrphanedPolicy, StructuralError,
};
use crate::policy::{AttachedPolicy, EffectivePolicyIndex, PolicyResolver};
use crate::records::{PolicyRecord, Record};

/// Reference to a policy, as shown next to the resources it attaches to
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PolicyRef {
    /// API group of the policy
    pub group: String,
    /// Kind of the policy
    pub kind: String,
    /// Namespace of the policy (empty for cluster-scoped policies)
    pub namespace: String,
    /// Name of the policy
    pub name: String,
}

impl From<&ObjectKey> for PolicyRef {
    fn from(key: &ObjectKey) -> Self {
        Self {
            group: key.kind.group().to_string(),
            kind: key.kind.kind_name().to_string(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    }
}

/// Counts for reporting
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    /// Node count per kind ("Kind.group" for non-core groups)
    pub nodes_by_kind: BTreeMap<String, usize>,
    /// Attached policies
    pub policies: usize,
    /// Cycles and duplicates
    pub structural_errors: usize,
    /// Unresolved parent and backend references
    pub dangling_references: usize,
    /// Policies with a dangling target
    pub orphaned_policies: usize,
    /// Policies whose target sits in or below a cycle
    pub excluded_policies: usize,
    /// Objects that failed to parse
    pub invalid_records: usize,
}

/// Resource graph plus resolved policies and every diagnostic
///
/// Immutable once built; share it freely between readers.
#[derive(Clone, Debug, Default)]
pub struct ResourceModel {
    graph: ResourceGraph,
    index: EffectivePolicyIndex,
    invalid_records: Vec<InvalidRecord>,
}

impl ResourceModel {
    /// Build a model from already-parsed records
    pub fn from_records(
        records: Vec<Record>,
        policies: Vec<PolicyRecord>,
        duplicate_policy: DuplicatePolicy,
    ) -> Self {
        let graph = GraphBuilder::new(duplicate_policy).build(records);
        let index = PolicyResolver::new(duplicate_policy).resolve(&graph, policies);
        Self::new(graph, index, Vec::new())
    }

    pub(crate) fn new(
        mut graph: ResourceGraph,
        index: EffectivePolicyIndex,
        invalid_records: Vec<InvalidRecord>,
    ) -> Self {
        graph.attach_policies(index.direct_map());
        Self {
            graph,
            index,
            invalid_records,
        }
    }

    /// The underlying graph
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Look up a node by identity
    pub fn node(&self, key: &ObjectKey) -> Option<&ResourceNode> {
        self.graph.node(key)
    }

    /// Nodes of one kind, sorted by (namespace, name)
    pub fn nodes_of_kind(&self, kind: &ResourceKind) -> Vec<&ResourceNode> {
        self.graph.nodes_of_kind(kind).collect()
    }

    /// Look up an attached policy
    pub fn policy(&self, key: &ObjectKey) -> Option<&AttachedPolicy> {
        self.index.policy(key)
    }

    /// Every attached policy, sorted by identity
    pub fn policies(&self) -> Vec<&AttachedPolicy> {
        self.index.policies().collect()
    }

    /// Effective policy sequence of a node, most specific first
    ///
    /// Empty for unknown nodes and for nodes excluded by a cycle.
    pub fn effective_policies(&self, key: &ObjectKey) -> Vec<&AttachedPolicy> {
        self.lookup(self.index.effective(key))
    }

    /// Policies attached directly to a node, in precedence order
    pub fn direct_policies(&self, key: &ObjectKey) -> Vec<&AttachedPolicy> {
        self.lookup(self.index.direct(key))
    }

    fn lookup(&self, keys: &[ObjectKey]) -> Vec<&AttachedPolicy> {
        keys.iter().filter_map(|k| self.index.policy(k)).collect()
    }

    /// Directly attached policies of a node as sorted references
    pub fn policy_refs(&self, key: &ObjectKey) -> Vec<PolicyRef> {
        let mut refs: Vec<PolicyRef> = self.index.direct(key).iter().map(PolicyRef::from).collect();
        refs.sort();
        refs
    }

    /// Policies whose target did not resolve
    pub fn orphaned_policies(&self) -> &[OrphanedPolicy] {
        self.index.orphaned()
    }

    /// Policies whose target was excluded because of a cycle
    pub fn excluded_policies(&self) -> &[ExcludedPolicy] {
        self.index.excluded()
    }

    /// Graph and policy structural errors
    pub fn structural_errors(&self) -> Vec<&StructuralError> {
        self.graph
            .structural_errors()
            .iter()
            .chain(self.index.structural_errors())
            .collect()
    }

    /// Parent and backend references that did not resolve
    pub fn dangling_references(&self) -> &[DanglingReference] {
        self.graph.dangling_references()
    }

    /// Objects that failed to parse
    pub fn invalid_records(&self) -> &[InvalidRecord] {
        &self.invalid_records
    }

    /// Every diagnostic, owned, for reporting
    pub fn issues(&self) -> Issues {
        Issues {
            structural_errors: self.structural_errors().into_iter().cloned().collect(),
            dangling_references: self.dangling_references().to_vec(),
            orphaned_policies: self.orphaned_policies().to_vec(),
            excluded_policies: self.excluded_policies().to_vec(),
            invalid_records: self.invalid_records.clone(),
        }
    }

    /// Counts per kind and per diagnostic
    pub fn summary(&self) -> ModelSummary {
        let mut nodes_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for node in self.graph.nodes() {
            *nodes_by_kind.entry(node.kind().to_string()).or_default() += 1;
        }
        ModelSummary {
            nodes_by_kind,
            policies: self.index.policies().count(),
            structural_errors: self.structural_errors().len(),
            dangling_references: self.dangling_references().len(),
            orphaned_policies: self.orphaned_policies().len(),
            excluded_policies: self.excluded_policies().len(),
            invalid_records: self.invalid_records.len(),
        }
    }
}
