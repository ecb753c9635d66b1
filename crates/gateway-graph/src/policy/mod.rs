//! Policy attachment and inheritance
//!
//! Each policy names a single target. Once attached, a policy applies to its
//! target and to everything below it. The effective sequence for a node
//! starts with its own direct policies and continues with those of its
//! ancestors, nearest first.
//!
//! Within one distance the order is fixed by the target, not by discovery:
//!
//! ```text
//! Section > Resource > Namespace > Class
//! ```
//!
//! then `(namespace, name)` of the policy, then its kind.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use gateway_graph_common::{DuplicatePolicy, ObjectKey, ObjectRef, ResourceKind};

use crate::graph::{deduplicate, ResourceGraph};
use crate::issues::{ExcludedPolicy, OrphanedPolicy, StructuralError};
use crate::records::PolicyRecord;
use crate::resolver::{ReferenceResolver, ResolvedRef};

/// How narrowly a policy's target is scoped; higher is more specific
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Specificity {
    /// Targets a GatewayClass
    Class,
    /// Targets a Namespace
    Namespace,
    /// Targets a whole resource
    Resource,
    /// Targets one section (e.g., a listener) of a resource
    Section,
}

impl Specificity {
    /// Derive the specificity of a target reference
    pub fn of_target(target: &ObjectRef) -> Self {
        match target.kind {
            ResourceKind::GatewayClass => Self::Class,
            ResourceKind::Namespace => Self::Namespace,
            _ if target.section_name.is_some() => Self::Section,
            _ => Self::Resource,
        }
    }
}

/// A policy attached to a node
#[derive(Clone, Debug)]
pub struct AttachedPolicy {
    /// The parsed policy
    pub record: PolicyRecord,
    /// Identity of the node it attaches to
    pub target: ObjectKey,
    /// Specificity derived from the target reference
    pub specificity: Specificity,
}

impl AttachedPolicy {
    /// Identity of the policy
    pub fn key(&self) -> &ObjectKey {
        &self.record.key
    }

    /// Section of the target the policy is restricted to, if any
    pub fn section_name(&self) -> Option<&str> {
        self.record.target.section_name.as_deref()
    }

    /// Opaque payload (`spec` without `targetRef`)
    pub fn payload(&self) -> &Value {
        &self.record.payload
    }
}

/// Precedence within one distance: specificity descending, then
/// (namespace, name) ascending, then kind
fn precedence(a: &AttachedPolicy, b: &AttachedPolicy) -> Ordering {
    b.specificity
        .cmp(&a.specificity)
        .then_with(|| a.key().namespace.cmp(&b.key().namespace))
        .then_with(|| a.key().name.cmp(&b.key().name))
        .then_with(|| a.key().kind.cmp(&b.key().kind))
}

/// Direct and effective policies per node, plus the policies that could not
/// be attached
#[derive(Clone, Debug, Default)]
pub struct EffectivePolicyIndex {
    policies: BTreeMap<ObjectKey, AttachedPolicy>,
    direct: BTreeMap<ObjectKey, Vec<ObjectKey>>,
    effective: BTreeMap<ObjectKey, Vec<ObjectKey>>,
    orphaned: Vec<OrphanedPolicy>,
    excluded: Vec<ExcludedPolicy>,
    structural_errors: Vec<StructuralError>,
}

impl EffectivePolicyIndex {
    /// Look up an attached policy
    pub fn policy(&self, key: &ObjectKey) -> Option<&AttachedPolicy> {
        self.policies.get(key)
    }

    /// Every attached policy, sorted by identity
    pub fn policies(&self) -> impl Iterator<Item = &AttachedPolicy> {
        self.policies.values()
    }

    /// Policies attached directly to a node, in precedence order
    pub fn direct(&self, node: &ObjectKey) -> &[ObjectKey] {
        self.direct.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Effective policy sequence of a node, most specific first
    pub fn effective(&self, node: &ObjectKey) -> &[ObjectKey] {
        self.effective.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Policies whose target did not resolve
    pub fn orphaned(&self) -> &[OrphanedPolicy] {
        &self.orphaned
    }

    /// Policies whose target was excluded because of a cycle
    pub fn excluded(&self) -> &[ExcludedPolicy] {
        &self.excluded
    }

    /// Duplicate policy identities
    pub fn structural_errors(&self) -> &[StructuralError] {
        &self.structural_errors
    }

    pub(crate) fn direct_map(&self) -> &BTreeMap<ObjectKey, Vec<ObjectKey>> {
        &self.direct
    }
}

/// Attaches policies to a graph and computes inheritance
#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyResolver {
    duplicate_policy: DuplicatePolicy,
}

impl PolicyResolver {
    /// Create a resolver with the given duplicate-identity policy
    pub fn new(duplicate_policy: DuplicatePolicy) -> Self {
        Self { duplicate_policy }
    }

    /// Resolve policies against a built graph
    ///
    /// The result depends only on the graph and the set of policies, never
    /// on the order they were fetched in.
    pub fn resolve(
        &self,
        graph: &ResourceGraph,
        policies: impl IntoIterator<Item = PolicyRecord>,
    ) -> EffectivePolicyIndex {
        let (policies, structural_errors) =
            deduplicate(policies, self.duplicate_policy, |policy| &policy.key);

        let resolver = ReferenceResolver::new(graph.snapshot());
        let mut index = EffectivePolicyIndex {
            structural_errors,
            ..Default::default()
        };

        for (key, record) in policies {
            match resolver.resolve(&record.target) {
                ResolvedRef::Dangling(d) => {
                    warn!(
                        policy = %key,
                        target = %d.reference,
                        reason = %d.reason,
                        "orphaned policy"
                    );
                    index.orphaned.push(OrphanedPolicy {
                        policy: key,
                        target: d.reference,
                        reason: d.reason,
                    });
                }
                ResolvedRef::Bound { key: target, .. } if graph.is_excluded(target) => {
                    warn!(policy = %key, target = %target, "policy target excluded by cycle");
                    index.excluded.push(ExcludedPolicy {
                        policy: key,
                        target: target.clone(),
                    });
                }
                ResolvedRef::Bound { key: target, .. } => {
                    let specificity = Specificity::of_target(&record.target);
                    index.direct.entry(target.clone()).or_default().push(key.clone());
                    index.policies.insert(
                        key,
                        AttachedPolicy {
                            record,
                            target: target.clone(),
                            specificity,
                        },
                    );
                }
            }
        }

        let policies = &index.policies;
        for attached in index.direct.values_mut() {
            sort_by_precedence(attached, policies);
        }

        for node in graph.nodes() {
            if graph.is_excluded(&node.key) {
                continue;
            }
            let effective = effective_for(graph, &index, &node.key);
            if !effective.is_empty() {
                index.effective.insert(node.key.clone(), effective);
            }
        }

        debug!(
            attached = index.policies.len(),
            orphaned = index.orphaned.len(),
            excluded = index.excluded.len(),
            "resolved policies"
        );
        index
    }
}

fn sort_by_precedence(keys: &mut [ObjectKey], policies: &BTreeMap<ObjectKey, AttachedPolicy>) {
    keys.sort_by(|a, b| match (policies.get(a), policies.get(b)) {
        (Some(a), Some(b)) => precedence(a, b),
        _ => a.cmp(b),
    });
}

/// Breadth-first upward walk from `start` over parents and namespace scope
fn effective_for(
    graph: &ResourceGraph,
    index: &EffectivePolicyIndex,
    start: &ObjectKey,
) -> Vec<ObjectKey> {
    let mut visited: BTreeSet<&ObjectKey> = BTreeSet::from([start]);
    let mut seen: BTreeSet<&ObjectKey> = BTreeSet::new();
    let mut level: Vec<&ObjectKey> = vec![start];
    let mut effective = Vec::new();

    while !level.is_empty() {
        let mut found: Vec<ObjectKey> = level
            .iter()
            .flat_map(|key| index.direct(key))
            .filter(|policy| seen.insert(*policy))
            .cloned()
            .collect();
        sort_by_precedence(&mut found, &index.policies);
        effective.extend(found);

        let mut next = Vec::new();
        for key in &level {
            let Some(node) = graph.node(key) else {
                continue;
            };
            let upward = node.parents.iter().chain(node.namespace_scope.iter());
            for ancestor in upward {
                if !graph.is_excluded(ancestor) && visited.insert(ancestor) {
                    next.push(ancestor);
                }
            }
        }
        level = next;
    }

    effective
}
