//! One discovery pass: fetch, parse, build, resolve
//!
//! Fetching is the only fallible stage. Every kind is listed concurrently
//! and all lists must succeed before a graph is built; everything after that
//! is synchronous and reports problems as issues instead of errors.

use futures::future::try_join_all;
use kube::api::DynamicObject;
use tracing::{debug, info, warn};

use gateway_graph_common::{DiscoveryConfig, KindDescriptor, PolicyKind, ResourceKind, Result};

use crate::graph::GraphBuilder;
use crate::issues::InvalidRecord;
use crate::model::ResourceModel;
use crate::policy::PolicyResolver;
use crate::records::{PolicyRecord, Record};
use crate::store::ObjectStore;

/// Policy kinds to list: configured ones, then discovered ones not already
/// configured
async fn policy_kinds(store: &dyn ObjectStore, config: &DiscoveryConfig) -> Result<Vec<PolicyKind>> {
    let mut kinds = config.policy_kinds.clone();
    if config.discover_policy_crds {
        for discovered in store.policy_kinds().await? {
            if !kinds.iter().any(|k| k.group_kind() == discovered.group_kind()) {
                kinds.push(discovered);
            }
        }
    }
    Ok(kinds)
}

/// Every kind one pass lists
pub fn descriptors(config: &DiscoveryConfig, policy_kinds: &[PolicyKind]) -> Vec<KindDescriptor> {
    ResourceKind::BUILTIN
        .into_iter()
        .filter(|kind| config.include_grpc_routes || *kind != ResourceKind::GrpcRoute)
        .filter_map(KindDescriptor::builtin)
        .chain(policy_kinds.iter().map(KindDescriptor::policy))
        .collect()
}

/// Run one discovery pass against a store
///
/// Fails on invalid configuration or when any list fails; no partial model
/// is returned. Everything else is reported through the model's issues.
pub async fn discover(store: &dyn ObjectStore, config: &DiscoveryConfig) -> Result<ResourceModel> {
    config.validate()?;

    let policy_kinds = policy_kinds(store, config).await?;
    let descriptors = descriptors(config, &policy_kinds);
    debug!(kinds = descriptors.len(), policy_kinds = policy_kinds.len(), "listing kinds");

    let lists = try_join_all(descriptors.iter().map(|descriptor| async move {
        store.list(descriptor).await.map(|objects| (descriptor, objects))
    }))
    .await?;

    let mut records = Vec::new();
    let mut policies = Vec::new();
    let mut invalid_records = Vec::new();

    for (descriptor, objects) in lists {
        for object in objects {
            if !in_scope(config, descriptor, &object) {
                continue;
            }
            let kind = descriptor.kind.clone();
            let namespace = object.metadata.namespace.clone();
            let name = object.metadata.name.clone();

            let parsed = if kind.is_policy() {
                PolicyRecord::from_object(kind.clone(), object).map(|p| policies.push(p))
            } else {
                Record::from_object(kind.clone(), object).map(|r| records.push(r))
            };

            if let Err(e) = parsed {
                warn!(kind = %kind, namespace = ?namespace, name = ?name, error = %e, "skipping invalid object");
                invalid_records.push(InvalidRecord {
                    kind,
                    namespace,
                    name,
                    message: e.to_string(),
                });
            }
        }
    }

    let fetched = records.len() + policies.len();
    let graph = GraphBuilder::new(config.duplicate_policy).build(records);
    let index = PolicyResolver::new(config.duplicate_policy).resolve(&graph, policies);
    let model = ResourceModel::new(graph, index, invalid_records);

    let summary = model.summary();
    info!(
        objects = fetched,
        nodes = model.graph().len(),
        policies = summary.policies,
        structural_errors = summary.structural_errors,
        dangling_references = summary.dangling_references,
        orphaned_policies = summary.orphaned_policies,
        invalid_records = summary.invalid_records,
        "discovery complete"
    );
    Ok(model)
}

/// Drop namespaced objects outside the configured namespace, whatever the
/// store returned
fn in_scope(config: &DiscoveryConfig, descriptor: &KindDescriptor, object: &DynamicObject) -> bool {
    match (&config.namespace, descriptor.namespaced) {
        (Some(ns), true) => object.metadata.namespace.as_deref() == Some(ns.as_str()),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::*;
    use crate::store::MockObjectStore;
    use gateway_graph_common::{DuplicatePolicy, Error, ObjectKey};
    use serde_json::json;

    fn health_check() -> PolicyKind {
        PolicyKind::new("foo.com", "v1alpha1", "HealthCheckPolicy")
    }

    fn objects_for(kind: &KindDescriptor) -> Vec<DynamicObject> {
        let record = |r: Record| r.object;
        match kind.kind {
            ResourceKind::GatewayClass => vec![record(gateway_class("istio"))],
            ResourceKind::Gateway => vec![record(gateway("prod", "gw1", "istio"))],
            ResourceKind::HttpRoute => vec![
                record(http_route("prod", "checkout", &["gw1"], &["api"])),
                object(json!({ "metadata": { "name": "nameless-ns" } })),
            ],
            ResourceKind::Service => vec![record(service("prod", "api"))],
            ResourceKind::Policy(_) => vec![policy("prod", "hc", "Gateway", "gw1").object],
            _ => Vec::new(),
        }
    }

    fn mock_store() -> MockObjectStore {
        let mut store = MockObjectStore::new();
        store.expect_policy_kinds().returning(|| Ok(vec![health_check()]));
        store.expect_list().returning(|kind| Ok(objects_for(kind)));
        store
    }

    #[tokio::test]
    async fn discovery_builds_model_from_store() {
        let store = mock_store();
        let model = discover(&store, &DiscoveryConfig::default()).await.unwrap();

        assert_eq!(model.graph().len(), 4);
        let api = ObjectKey::new(ResourceKind::Service, "prod", "api");
        let names: Vec<_> = model
            .effective_policies(&api)
            .iter()
            .map(|p| p.key().name.as_str())
            .collect();
        assert_eq!(names, vec!["hc"]);

        // The route without a namespace is reported, not fatal
        assert_eq!(model.invalid_records().len(), 1);
        assert_eq!(model.invalid_records()[0].name.as_deref(), Some("nameless-ns"));
        assert_eq!(model.invalid_records()[0].kind, ResourceKind::HttpRoute);
    }

    #[tokio::test]
    async fn failed_list_aborts_discovery() {
        let mut store = MockObjectStore::new();
        store.expect_policy_kinds().returning(|| Ok(Vec::new()));
        store.expect_list().returning(|kind| match kind.kind {
            ResourceKind::Gateway => Err(Error::fetch_for_kind("Gateway", "connection reset")),
            _ => Ok(Vec::new()),
        });

        match discover(&store, &DiscoveryConfig::default()).await {
            Err(Error::Fetch { kind, .. }) => assert_eq!(kind, "Gateway"),
            other => panic!("expected fetch error, got {:?}", other.map(|m| m.summary())),
        }
    }

    #[tokio::test]
    async fn forbidden_crd_listing_aborts_without_retry() {
        let mut store = MockObjectStore::new();
        store.expect_policy_kinds().returning(|| {
            Err(Error::from(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "customresourcedefinitions is forbidden".to_string(),
                reason: "Forbidden".to_string(),
                code: 403,
            })))
        });
        store.expect_list().never();

        match discover(&store, &DiscoveryConfig::default()).await {
            Err(err @ Error::Kube { .. }) => assert!(!err.is_retryable()),
            other => panic!("expected kube error, got {:?}", other.map(|m| m.summary())),
        }
    }

    #[tokio::test]
    async fn invalid_config_fails_before_fetching() {
        let mut store = MockObjectStore::new();
        store.expect_policy_kinds().never();
        store.expect_list().never();

        let config = DiscoveryConfig {
            namespace: Some(String::new()),
            ..Default::default()
        };
        let result = discover(&store, &config).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn policy_crd_discovery_can_be_disabled() {
        let mut store = MockObjectStore::new();
        store.expect_policy_kinds().never();
        store
            .expect_list()
            .withf(|kind| !kind.kind.is_policy())
            .returning(|kind| Ok(objects_for(kind)));

        let config = DiscoveryConfig {
            discover_policy_crds: false,
            ..Default::default()
        };
        let model = discover(&store, &config).await.unwrap();
        assert!(model.policies().is_empty());
    }

    #[tokio::test]
    async fn namespace_restriction_filters_store_results() {
        let mut store = MockObjectStore::new();
        store.expect_policy_kinds().returning(|| Ok(Vec::new()));
        store.expect_list().returning(|kind| match kind.kind {
            ResourceKind::Service => Ok(vec![service("prod", "a").object, service("staging", "b").object]),
            ResourceKind::Namespace => Ok(vec![namespace("staging").object]),
            _ => Ok(Vec::new()),
        });

        let config = DiscoveryConfig {
            namespace: Some("prod".to_string()),
            ..Default::default()
        };
        let model = discover(&store, &config).await.unwrap();
        assert_eq!(model.nodes_of_kind(&ResourceKind::Service).len(), 1);
        // Cluster-scoped kinds are never filtered
        assert_eq!(model.nodes_of_kind(&ResourceKind::Namespace).len(), 1);
    }

    #[test]
    fn descriptors_honour_grpc_toggle_and_policy_kinds() {
        let config = DiscoveryConfig {
            include_grpc_routes: false,
            duplicate_policy: DuplicatePolicy::KeepLast,
            ..Default::default()
        };
        let kinds = descriptors(&config, &[health_check()]);
        assert!(!kinds.iter().any(|d| d.kind == ResourceKind::GrpcRoute));
        assert_eq!(kinds.len(), 6);
        assert_eq!(kinds.last().unwrap().api_version, "foo.com/v1alpha1");
    }

    #[tokio::test]
    async fn configured_policy_kind_wins_over_discovered() {
        let mut store = MockObjectStore::new();
        let mut discovered = health_check();
        discovered.version = "v1".to_string();
        store
            .expect_policy_kinds()
            .returning(move || Ok(vec![discovered.clone()]));

        let config = DiscoveryConfig {
            policy_kinds: vec![health_check()],
            ..Default::default()
        };
        let kinds = policy_kinds(&store, &config).await.unwrap();
        assert_eq!(kinds, vec![health_check()]);
    }
}
