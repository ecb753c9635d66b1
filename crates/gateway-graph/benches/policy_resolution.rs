//! Criterion benchmarks for graph building and policy resolution
//!
//! Topologies are synthetic but shaped like a shared-gateway cluster: a few
//! classes, a handful of gateways per namespace, many routes fanning out to
//! services, and policies spread across every level.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kube::api::DynamicObject;
use rand::prelude::*;
use serde_json::{json, Value};

use gateway_graph::{GraphBuilder, PolicyRecord, PolicyResolver, Record, ResourceModel};
use gateway_graph_common::{DuplicatePolicy, GroupKind, ObjectKey, ResourceKind};

// =============================================================================
// Fixtures
// =============================================================================

const NAMESPACES: usize = 8;
const CLASSES: usize = 2;
const GATEWAYS_PER_NAMESPACE: usize = 2;

fn object(value: Value) -> DynamicObject {
    serde_json::from_value(value).expect("valid object")
}

fn policy_kind() -> ResourceKind {
    ResourceKind::Policy(GroupKind::new("foo.com", "TimeoutPolicy"))
}

struct Topology {
    records: Vec<Record>,
    policies: Vec<PolicyRecord>,
    routes: Vec<ObjectKey>,
}

/// `routes` routes spread over all namespaces, one service per route and one
/// policy per ten resources
fn setup_topology(routes: usize, rng: &mut StdRng) -> Topology {
    let mut records = Vec::new();
    let mut policies = Vec::new();
    let mut route_keys = Vec::new();

    let mut add_policy = |rng: &mut StdRng, ns: &str, kind: &str, group: &str, name: &str| {
        let policy_name = format!("p-{}-{}", kind.to_lowercase(), name);
        let mut target = json!({ "group": group, "kind": kind, "name": name });
        if rng.gen_bool(0.2) && kind == "Gateway" {
            target["sectionName"] = json!("http");
        }
        let obj = object(json!({
            "metadata": { "name": policy_name, "namespace": ns },
            "spec": { "targetRef": target, "default": { "timeout": "5s" } }
        }));
        policies.push(PolicyRecord::from_object(policy_kind(), obj).expect("valid policy"));
    };

    for c in 0..CLASSES {
        let name = format!("class-{}", c);
        records.push(
            Record::from_object(
                ResourceKind::GatewayClass,
                object(json!({
                    "metadata": { "name": name },
                    "spec": { "controllerName": "example.net/controller" }
                })),
            )
            .expect("valid class"),
        );
        add_policy(rng, "", "GatewayClass", "gateway.networking.k8s.io", &name);
    }

    for n in 0..NAMESPACES {
        let ns = format!("ns-{}", n);
        records.push(
            Record::from_object(ResourceKind::Namespace, object(json!({ "metadata": { "name": ns } })))
                .expect("valid namespace"),
        );
        add_policy(rng, &ns, "Namespace", "", &ns);

        for g in 0..GATEWAYS_PER_NAMESPACE {
            let name = format!("gw-{}", g);
            records.push(
                Record::from_object(
                    ResourceKind::Gateway,
                    object(json!({
                        "metadata": { "name": name, "namespace": ns },
                        "spec": { "gatewayClassName": format!("class-{}", rng.gen_range(0..CLASSES)) }
                    })),
                )
                .expect("valid gateway"),
            );
            add_policy(rng, &ns, "Gateway", "gateway.networking.k8s.io", &name);
        }
    }

    for r in 0..routes {
        let ns = format!("ns-{}", r % NAMESPACES);
        let name = format!("route-{}", r);
        let svc = format!("svc-{}", r);
        let fan_in = rng.gen_range(1..=GATEWAYS_PER_NAMESPACE);
        let parents: Vec<Value> = (0..GATEWAYS_PER_NAMESPACE)
            .choose_multiple(rng, fan_in)
            .into_iter()
            .map(|g| json!({ "name": format!("gw-{}", g) }))
            .collect();

        records.push(
            Record::from_object(
                ResourceKind::HttpRoute,
                object(json!({
                    "metadata": { "name": name, "namespace": ns },
                    "spec": {
                        "parentRefs": parents,
                        "rules": [{ "backendRefs": [{ "name": svc, "port": 8080 }] }]
                    }
                })),
            )
            .expect("valid route"),
        );
        records.push(
            Record::from_object(
                ResourceKind::Service,
                object(json!({ "metadata": { "name": svc, "namespace": ns } })),
            )
            .expect("valid service"),
        );
        if r % 10 == 0 {
            add_policy(rng, &ns, "HTTPRoute", "gateway.networking.k8s.io", &name);
        }
        route_keys.push(ObjectKey::new(ResourceKind::HttpRoute, ns, name));
    }

    records.shuffle(rng);
    policies.shuffle(rng);
    Topology {
        records,
        policies,
        routes: route_keys,
    }
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_build_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_graph");
    for size in [100usize, 1000, 5000] {
        let mut rng = StdRng::seed_from_u64(7);
        let topology = setup_topology(size, &mut rng);
        group.throughput(Throughput::Elements(topology.records.len() as u64));
        group.bench_with_input(BenchmarkId::new("records", size), &topology, |b, topology| {
            b.iter_batched(
                || topology.records.clone(),
                |records| black_box(GraphBuilder::default().build(records)),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_resolve_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_policies");
    for size in [100usize, 1000, 5000] {
        let mut rng = StdRng::seed_from_u64(7);
        let topology = setup_topology(size, &mut rng);
        let graph = GraphBuilder::default().build(topology.records.clone());
        group.throughput(Throughput::Elements(graph.len() as u64));
        group.bench_with_input(BenchmarkId::new("nodes", size), &topology, |b, topology| {
            b.iter_batched(
                || topology.policies.clone(),
                |policies| black_box(PolicyResolver::default().resolve(&graph, policies)),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_effective_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("effective_policies");
    for size in [100usize, 1000, 5000] {
        let mut rng = StdRng::seed_from_u64(7);
        let topology = setup_topology(size, &mut rng);
        let model = ResourceModel::from_records(
            topology.records,
            topology.policies,
            DuplicatePolicy::KeepFirst,
        );
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("route", size), &topology.routes, |b, routes| {
            let mut rng = StdRng::seed_from_u64(11);
            b.iter(|| {
                let key = &routes[rng.gen_range(0..routes.len())];
                black_box(model.effective_policies(key));
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_build_graph,
    bench_resolve_policies,
    bench_effective_lookup
);
criterion_main!(benches);
