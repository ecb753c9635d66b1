//! Resource graph
//!
//! The graph owns every node in one identity-keyed map. Nodes refer to their
//! parents, children and namespace only by identity, and every lookup goes
//! back through the graph, so there are no ownership cycles between nodes.
//!
//! Parentage follows Gateway API attachment:
//!
//! ```text
//! GatewayClass -> Gateway -> HTTPRoute/GRPCRoute -> Service
//! ```
//!
//! A child's parents are exactly the ones declared in its own spec, except
//! for backends, which are declared by the route pointing at them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use gateway_graph_common::{DuplicatePolicy, ObjectKey, ResourceKind};

use crate::issues::{DanglingReference, StructuralError};
use crate::records::Record;
use crate::resolver::{DanglingRef, ReferenceResolver, ResolvedRef};

/// A node in the resource graph: one per distinct identity
#[derive(Clone, Debug)]
pub struct ResourceNode {
    /// Identity of the resource
    pub key: ObjectKey,
    /// The fetched record
    pub record: Record,
    /// Parent identities, sorted
    pub parents: Vec<ObjectKey>,
    /// Child identities, sorted
    pub children: Vec<ObjectKey>,
    /// Namespace object this resource lives in, when it was fetched
    pub namespace_scope: Option<ObjectKey>,
    /// References this resource declared that did not resolve
    pub unresolved: Vec<DanglingRef>,
    /// Policies attached directly to this resource, in precedence order
    pub direct_policies: Vec<ObjectKey>,
}

impl ResourceNode {
    fn new(record: Record) -> Self {
        Self {
            key: record.key.clone(),
            record,
            parents: Vec::new(),
            children: Vec::new(),
            namespace_scope: None,
            unresolved: Vec::new(),
            direct_policies: Vec::new(),
        }
    }

    /// Resource kind of this node
    pub fn kind(&self) -> &ResourceKind {
        &self.key.kind
    }

    /// Whether the node has no parents
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Identity-keyed resource graph
#[derive(Clone, Debug, Default)]
pub struct ResourceGraph {
    nodes: BTreeMap<ObjectKey, ResourceNode>,
    excluded: BTreeSet<ObjectKey>,
    structural_errors: Vec<StructuralError>,
    dangling: Vec<DanglingReference>,
}

impl ResourceGraph {
    /// Get a node by identity
    pub fn node(&self, key: &ObjectKey) -> Option<&ResourceNode> {
        self.nodes.get(key)
    }

    /// Whether a node with this identity exists
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// All nodes, sorted by identity
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    /// Nodes of one kind, sorted by (namespace, name)
    pub fn nodes_of_kind(&self, kind: &ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        let kind = kind.clone();
        self.nodes.values().filter(move |node| node.key.kind == kind)
    }

    /// Parent nodes of a node
    pub fn parents_of(&self, key: &ObjectKey) -> Vec<&ResourceNode> {
        self.linked(key, |node| &node.parents)
    }

    /// Child nodes of a node
    pub fn children_of(&self, key: &ObjectKey) -> Vec<&ResourceNode> {
        self.linked(key, |node| &node.children)
    }

    fn linked<'a>(
        &'a self,
        key: &ObjectKey,
        select: impl Fn(&'a ResourceNode) -> &'a Vec<ObjectKey>,
    ) -> Vec<&'a ResourceNode> {
        self.nodes
            .get(key)
            .map(|node| {
                select(node)
                    .iter()
                    .filter_map(|k| self.nodes.get(k))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the node is excluded from policy resolution (cycle member or
    /// below one)
    pub fn is_excluded(&self, key: &ObjectKey) -> bool {
        self.excluded.contains(key)
    }

    /// Every excluded identity, sorted
    pub fn excluded(&self) -> &BTreeSet<ObjectKey> {
        &self.excluded
    }

    /// Cycles and duplicate identities found while building
    pub fn structural_errors(&self) -> &[StructuralError] {
        &self.structural_errors
    }

    /// Declared references that did not resolve
    pub fn dangling_references(&self) -> &[DanglingReference] {
        &self.dangling
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn snapshot(&self) -> &BTreeMap<ObjectKey, ResourceNode> {
        &self.nodes
    }

    pub(crate) fn attach_policies(&mut self, direct: &BTreeMap<ObjectKey, Vec<ObjectKey>>) {
        for (target, policies) in direct {
            if let Some(node) = self.nodes.get_mut(target) {
                node.direct_policies = policies.clone();
            }
        }
    }
}

/// Builds a [`ResourceGraph`] from fetched records
#[derive(Clone, Copy, Debug, Default)]
pub struct GraphBuilder {
    duplicate_policy: DuplicatePolicy,
}

impl GraphBuilder {
    /// Create a builder with the given duplicate-identity policy
    pub fn new(duplicate_policy: DuplicatePolicy) -> Self {
        Self { duplicate_policy }
    }

    /// Build the graph
    ///
    /// Every record ends up as exactly one node (duplicates collapse per the
    /// configured policy and are reported). Parentage edges are stored on
    /// both endpoints; references that do not resolve are kept on the
    /// declaring node. Cycle members and everything below them are marked
    /// excluded.
    pub fn build(&self, records: impl IntoIterator<Item = Record>) -> ResourceGraph {
        let (records, mut structural_errors) =
            deduplicate(records, self.duplicate_policy, |record| &record.key);

        let mut edges: BTreeSet<(ObjectKey, ObjectKey)> = BTreeSet::new();
        let mut dangling: Vec<DanglingReference> = Vec::new();
        {
            let resolver = ReferenceResolver::new(&records);
            for (key, record) in &records {
                for reference in &record.parent_refs {
                    match resolver.resolve(reference) {
                        ResolvedRef::Bound { key: parent, .. } => {
                            edges.insert((parent.clone(), key.clone()));
                        }
                        ResolvedRef::Dangling(d) => dangling.push(DanglingReference {
                            from: key.clone(),
                            reference: d,
                        }),
                    }
                }
                for reference in &record.child_refs {
                    match resolver.resolve(reference) {
                        ResolvedRef::Bound { key: child, .. } => {
                            edges.insert((key.clone(), child.clone()));
                        }
                        ResolvedRef::Dangling(d) => dangling.push(DanglingReference {
                            from: key.clone(),
                            reference: d,
                        }),
                    }
                }
            }
        }

        let mut nodes: BTreeMap<ObjectKey, ResourceNode> = records
            .into_iter()
            .map(|(key, record)| (key, ResourceNode::new(record)))
            .collect();

        // Edges iterate in (parent, child) order, so both lists come out sorted
        for (parent, child) in &edges {
            if let Some(node) = nodes.get_mut(parent) {
                node.children.push(child.clone());
            }
            if let Some(node) = nodes.get_mut(child) {
                node.parents.push(parent.clone());
            }
        }

        let namespaces: BTreeSet<ObjectKey> = nodes
            .keys()
            .filter(|key| key.kind == ResourceKind::Namespace)
            .cloned()
            .collect();
        for node in nodes.values_mut() {
            node.namespace_scope = node
                .key
                .namespace_key()
                .filter(|ns| namespaces.contains(ns));
        }

        for d in &dangling {
            warn!(
                from = %d.from,
                reference = %d.reference.reference,
                reason = %d.reference.reason,
                "dangling reference"
            );
            if let Some(node) = nodes.get_mut(&d.from) {
                node.unresolved.push(d.reference.clone());
            }
        }

        let cycles = find_cycles(&nodes);
        let mut excluded = BTreeSet::new();
        for participants in &cycles {
            let names: Vec<String> = participants.iter().map(ToString::to_string).collect();
            warn!(
                participants = %names.join(", "),
                "parentage cycle excluded from policy resolution"
            );
            excluded.extend(participants.iter().cloned());
        }
        let excluded = with_descendants(&nodes, excluded);
        structural_errors.extend(
            cycles
                .into_iter()
                .map(|participants| StructuralError::Cycle { participants }),
        );

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            dangling = dangling.len(),
            excluded = excluded.len(),
            "built resource graph"
        );

        ResourceGraph {
            nodes,
            excluded,
            structural_errors,
            dangling,
        }
    }
}

/// Collapse records sharing an identity
///
/// Returns the surviving records keyed by identity and one
/// `DuplicateIdentity` error per collapsed identity, sorted by identity.
pub(crate) fn deduplicate<T>(
    items: impl IntoIterator<Item = T>,
    policy: DuplicatePolicy,
    key_of: impl Fn(&T) -> &ObjectKey,
) -> (BTreeMap<ObjectKey, T>, Vec<StructuralError>) {
    let mut kept: BTreeMap<ObjectKey, T> = BTreeMap::new();
    let mut occurrences: BTreeMap<ObjectKey, usize> = BTreeMap::new();

    for item in items {
        let key = key_of(&item).clone();
        if kept.contains_key(&key) {
            *occurrences.entry(key.clone()).or_insert(1) += 1;
            if policy == DuplicatePolicy::KeepLast {
                kept.insert(key, item);
            }
        } else {
            kept.insert(key, item);
        }
    }

    let errors = occurrences
        .into_iter()
        .map(|(key, occurrences)| {
            warn!(key = %key, occurrences, policy = ?policy, "duplicate identity");
            StructuralError::DuplicateIdentity { key, occurrences }
        })
        .collect();
    (kept, errors)
}

/// Find parentage cycles as strongly connected components, walking in
/// identity order
///
/// Every component with more than one member, or a single member that is its
/// own parent, is one cycle. Participants are sorted.
fn find_cycles(nodes: &BTreeMap<ObjectKey, ResourceNode>) -> Vec<Vec<ObjectKey>> {
    let mut components = Components {
        nodes,
        index: HashMap::new(),
        lowlink: HashMap::new(),
        on_stack: HashSet::new(),
        stack: Vec::new(),
        next: 0,
        cycles: BTreeSet::new(),
    };
    for key in nodes.keys() {
        if !components.index.contains_key(key) {
            components.connect(key);
        }
    }
    components.cycles.into_iter().collect()
}

/// Tarjan's strongly connected components over child edges
struct Components<'a> {
    nodes: &'a BTreeMap<ObjectKey, ResourceNode>,
    index: HashMap<&'a ObjectKey, usize>,
    lowlink: HashMap<&'a ObjectKey, usize>,
    on_stack: HashSet<&'a ObjectKey>,
    stack: Vec<&'a ObjectKey>,
    next: usize,
    cycles: BTreeSet<Vec<ObjectKey>>,
}

impl<'a> Components<'a> {
    fn connect(&mut self, key: &'a ObjectKey) {
        self.index.insert(key, self.next);
        self.lowlink.insert(key, self.next);
        self.next += 1;
        self.stack.push(key);
        self.on_stack.insert(key);

        let nodes = self.nodes;
        let children: &'a [ObjectKey] = nodes
            .get(key)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[]);

        for child in children {
            let reachable = if !self.index.contains_key(child) {
                self.connect(child);
                self.lowlink[child]
            } else if self.on_stack.contains(child) {
                self.index[child]
            } else {
                continue;
            };
            if reachable < self.lowlink[key] {
                self.lowlink.insert(key, reachable);
            }
        }

        if self.lowlink[key] != self.index[key] {
            return;
        }

        let mut component = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack.remove(member);
            component.push(member.clone());
            if member == key {
                break;
            }
        }
        if component.len() > 1 || children.contains(key) {
            component.sort();
            self.cycles.insert(component);
        }
    }
}

fn with_descendants(
    nodes: &BTreeMap<ObjectKey, ResourceNode>,
    roots: BTreeSet<ObjectKey>,
) -> BTreeSet<ObjectKey> {
    let mut result = roots.clone();
    let mut queue: VecDeque<ObjectKey> = roots.into_iter().collect();
    while let Some(key) = queue.pop_front() {
        let Some(node) = nodes.get(&key) else {
            continue;
        };
        for child in &node.children {
            if result.insert(child.clone()) {
                queue.push_back(child.clone());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::*;
    use crate::resolver::DanglingReason;
    use gateway_graph_common::ObjectRef;

    fn build(records: Vec<Record>) -> ResourceGraph {
        GraphBuilder::default().build(records)
    }

    fn well_formed() -> Vec<Record> {
        vec![
            gateway_class("istio"),
            namespace("prod"),
            gateway("prod", "gw1", "istio"),
            gateway("prod", "gw2", "istio"),
            http_route("prod", "checkout", &["gw1", "gw2"], &["api", "web"]),
            http_route("prod", "search", &["gw1"], &["api"]),
            service("prod", "api"),
            service("prod", "web"),
        ]
    }

    #[test]
    fn every_record_becomes_exactly_one_node() {
        let graph = build(well_formed());
        assert_eq!(graph.len(), 8);
        assert!(graph.structural_errors().is_empty());
        assert!(graph.dangling_references().is_empty());
        assert!(graph.excluded().is_empty());
    }

    #[test]
    fn parent_and_child_lists_are_mutual_inverses() {
        let graph = build(well_formed());
        for node in graph.nodes() {
            for parent in &node.parents {
                let parent = graph.node(parent).expect("parent exists");
                assert!(parent.children.contains(&node.key));
            }
            for child in &node.children {
                let child = graph.node(child).expect("child exists");
                assert!(child.parents.contains(&node.key));
            }
        }
    }

    #[test]
    fn attachment_hierarchy_is_linked() {
        let graph = build(well_formed());
        let class = ObjectKey::cluster(ResourceKind::GatewayClass, "istio");
        let gw1 = key(ResourceKind::Gateway, "prod", "gw1");
        let checkout = key(ResourceKind::HttpRoute, "prod", "checkout");
        let api = key(ResourceKind::Service, "prod", "api");

        assert!(graph.node(&class).unwrap().is_root());
        assert_eq!(graph.children_of(&class).len(), 2);
        assert_eq!(graph.node(&gw1).unwrap().parents, vec![class]);
        assert_eq!(graph.node(&checkout).unwrap().parents.len(), 2);
        // api is a backend of both routes
        let api_parents: Vec<_> = graph.parents_of(&api).iter().map(|n| n.key.name.clone()).collect();
        assert_eq!(api_parents, vec!["checkout", "search"]);
    }

    #[test]
    fn namespaced_nodes_link_to_fetched_namespace() {
        let graph = build(well_formed());
        let gw1 = graph.node(&key(ResourceKind::Gateway, "prod", "gw1")).unwrap();
        assert_eq!(
            gw1.namespace_scope,
            Some(ObjectKey::cluster(ResourceKind::Namespace, "prod"))
        );
        // Namespace scope is not parentage
        assert!(!gw1.parents.iter().any(|p| p.kind == ResourceKind::Namespace));

        let graph = build(vec![gateway_class("istio"), gateway("other", "gw", "istio")]);
        let gw = graph.node(&key(ResourceKind::Gateway, "other", "gw")).unwrap();
        assert_eq!(gw.namespace_scope, None);
    }

    #[test]
    fn repeated_parent_reference_creates_one_edge() {
        let route = http_route("prod", "r", &["gw1"], &[])
            .with_parent(ObjectRef::new(ResourceKind::Gateway, "prod", "gw1").with_section("https"));
        let graph = build(vec![gateway_class("istio"), gateway("prod", "gw1", "istio"), route]);
        let gw1 = graph.node(&key(ResourceKind::Gateway, "prod", "gw1")).unwrap();
        assert_eq!(gw1.children.len(), 1);
    }

    /// Story: a route points at a gateway that was deleted
    #[test]
    fn story_deleted_parent_gateway_leaves_route_dangling() {
        let graph = build(vec![
            gateway_class("istio"),
            gateway("prod", "gw1", "istio"),
            http_route("prod", "orphan", &["deleted-gw"], &[]),
            service("prod", "api"),
        ]);

        let route = graph
            .node(&key(ResourceKind::HttpRoute, "prod", "orphan"))
            .expect("route still becomes a node");
        assert!(route.parents.is_empty());
        assert_eq!(route.unresolved.len(), 1);
        assert_eq!(route.unresolved[0].reason, DanglingReason::NotFound);
        assert_eq!(route.unresolved[0].reference.name, "deleted-gw");

        assert_eq!(graph.dangling_references().len(), 1);
        assert!(!graph.contains(&key(ResourceKind::Gateway, "prod", "deleted-gw")));

        // Independent nodes are unaffected
        let gw1 = graph.node(&key(ResourceKind::Gateway, "prod", "gw1")).unwrap();
        assert_eq!(gw1.parents.len(), 1);
        assert!(graph.structural_errors().is_empty());
    }

    #[test]
    fn dangling_backend_is_recorded_on_route() {
        let graph = build(vec![http_route("prod", "r", &[], &["missing"])]);
        let route = graph.node(&key(ResourceKind::HttpRoute, "prod", "r")).unwrap();
        assert!(route.children.is_empty());
        assert_eq!(route.unresolved[0].reference.kind, ResourceKind::Service);
    }

    /// Story: the store returned the same gateway twice
    #[test]
    fn story_duplicate_identity_yields_one_node_and_one_error() {
        let first = gateway("ns", "gw1", "class-a");
        let second = gateway("ns", "gw1", "class-b");
        let graph = build(vec![gateway_class("class-a"), gateway_class("class-b"), first, second]);

        let gw_key = key(ResourceKind::Gateway, "ns", "gw1");
        assert_eq!(graph.nodes_of_kind(&ResourceKind::Gateway).count(), 1);
        assert_eq!(
            graph.structural_errors(),
            &[StructuralError::DuplicateIdentity {
                key: gw_key.clone(),
                occurrences: 2
            }]
        );
        // KeepFirst: the later record is ignored
        let gw = graph.node(&gw_key).unwrap();
        assert_eq!(gw.parents[0].name, "class-a");
    }

    #[test]
    fn keep_last_prefers_the_later_duplicate() {
        let graph = GraphBuilder::new(DuplicatePolicy::KeepLast).build(vec![
            gateway_class("class-a"),
            gateway_class("class-b"),
            gateway("ns", "gw1", "class-a"),
            gateway("ns", "gw1", "class-b"),
        ]);
        let gw = graph.node(&key(ResourceKind::Gateway, "ns", "gw1")).unwrap();
        assert_eq!(gw.parents[0].name, "class-b");
        assert_eq!(graph.structural_errors().len(), 1);
        // class-a lost its only child
        let class_a = ObjectKey::cluster(ResourceKind::GatewayClass, "class-a");
        assert!(graph.children_of(&class_a).is_empty());
    }

    #[test]
    fn triple_duplicate_counts_occurrences() {
        let graph = build(vec![service("ns", "a"), service("ns", "a"), service("ns", "a")]);
        assert_eq!(
            graph.structural_errors(),
            &[StructuralError::DuplicateIdentity {
                key: key(ResourceKind::Service, "ns", "a"),
                occurrences: 3
            }]
        );
    }

    /// Story: two resources claim each other as parent
    #[test]
    fn story_two_node_cycle_is_detected_and_excluded() {
        let a = key(ResourceKind::Service, "ns", "a");
        let b = key(ResourceKind::Service, "ns", "b");
        let graph = build(vec![
            service("ns", "a").with_parent(ObjectRef::new(ResourceKind::Service, "ns", "b")),
            service("ns", "b").with_parent(ObjectRef::new(ResourceKind::Service, "ns", "a")),
            service("ns", "independent"),
        ]);

        assert_eq!(
            graph.structural_errors(),
            &[StructuralError::Cycle {
                participants: vec![a.clone(), b.clone()]
            }]
        );
        assert!(graph.is_excluded(&a));
        assert!(graph.is_excluded(&b));
        assert!(!graph.is_excluded(&key(ResourceKind::Service, "ns", "independent")));
        // Edges are still recorded both ways
        assert_eq!(graph.node(&a).unwrap().parents, vec![b.clone()]);
        assert_eq!(graph.node(&b).unwrap().children, vec![a]);
    }

    #[test]
    fn self_parent_is_a_cycle_of_one() {
        let a = key(ResourceKind::Service, "ns", "a");
        let graph =
            build(vec![service("ns", "a").with_parent(ObjectRef::new(ResourceKind::Service, "ns", "a"))]);
        assert_eq!(
            graph.structural_errors(),
            &[StructuralError::Cycle {
                participants: vec![a.clone()]
            }]
        );
        assert!(graph.is_excluded(&a));
    }

    #[test]
    fn descendants_of_a_cycle_are_excluded() {
        let a = key(ResourceKind::Gateway, "ns", "a");
        let b = key(ResourceKind::Gateway, "ns", "b");
        let graph = build(vec![
            gateway_class("istio"),
            gateway("ns", "a", "istio").with_parent(ObjectRef::new(ResourceKind::Gateway, "ns", "b")),
            gateway("ns", "b", "istio").with_parent(ObjectRef::new(ResourceKind::Gateway, "ns", "a")),
            http_route("ns", "below", &["a"], &["svc"]),
            service("ns", "svc"),
        ]);

        assert!(graph.is_excluded(&a));
        assert!(graph.is_excluded(&b));
        assert!(graph.is_excluded(&key(ResourceKind::HttpRoute, "ns", "below")));
        assert!(graph.is_excluded(&key(ResourceKind::Service, "ns", "svc")));
        // The class above the cycle is fine
        assert!(!graph.is_excluded(&ObjectKey::cluster(ResourceKind::GatewayClass, "istio")));
        assert_eq!(graph.structural_errors().len(), 1);
    }

    /// Story: a node reaches the cycle only through an already-walked member
    #[test]
    fn story_every_node_on_a_cycle_is_named() {
        let svc = |name: &str| key(ResourceKind::Service, "ns", name);
        let parent = |name: &str| ObjectRef::new(ResourceKind::Service, "ns", name);
        // a -> b -> c -> a, plus b -> d -> c
        let graph = build(vec![
            service("ns", "a").with_parent(parent("c")),
            service("ns", "b").with_parent(parent("a")),
            service("ns", "c").with_parent(parent("b")).with_parent(parent("d")),
            service("ns", "d").with_parent(parent("b")),
            service("ns", "e").with_parent(parent("c")),
        ]);

        assert_eq!(
            graph.structural_errors(),
            &[StructuralError::Cycle {
                participants: vec![svc("a"), svc("b"), svc("c"), svc("d")]
            }]
        );
        // e hangs below the cycle: excluded but not a participant
        assert!(graph.is_excluded(&svc("e")));
        assert_eq!(graph.excluded().len(), 5);
    }

    #[test]
    fn separate_cycles_are_reported_separately() {
        let svc = |name: &str| key(ResourceKind::Service, "ns", name);
        let parent = |name: &str| ObjectRef::new(ResourceKind::Service, "ns", name);
        let graph = build(vec![
            service("ns", "a").with_parent(parent("b")),
            service("ns", "b").with_parent(parent("a")),
            service("ns", "x").with_parent(parent("x")),
        ]);
        assert_eq!(
            graph.structural_errors(),
            &[
                StructuralError::Cycle {
                    participants: vec![svc("a"), svc("b")]
                },
                StructuralError::Cycle {
                    participants: vec![svc("x")]
                },
            ]
        );
    }

    #[test]
    fn empty_input_builds_empty_graph() {
        let graph = build(vec![]);
        assert!(graph.is_empty());
        assert!(graph.structural_errors().is_empty());
    }
}
