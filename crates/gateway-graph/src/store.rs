//! Object store adapters
//!
//! Discovery only ever lists whole kinds. [`KubeStore`] lists them from a
//! live cluster; [`StaticStore`] serves them from manifests held in memory.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DynamicObject, ListParams};
use kube::Client;
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use gateway_graph_common::kube_utils::{api_resource_for, parse_api_version};
use gateway_graph_common::resource::POLICY_LABEL_KEY;
use gateway_graph_common::yaml::parse_yaml_documents;
use gateway_graph_common::{
    DiscoveryConfig, Error, GroupKind, KindDescriptor, PolicyKind, ResourceKind, Result,
};

/// Namespace assumed for namespaced manifests that omit one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Trait abstracting read access to cluster objects
///
/// Allows mocking the store in tests while using the real Kubernetes client
/// in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object of one kind
    ///
    /// A kind the store does not know about lists as empty.
    async fn list(&self, kind: &KindDescriptor) -> Result<Vec<DynamicObject>>;

    /// Policy kinds the store advertises (policy CRDs)
    async fn policy_kinds(&self) -> Result<Vec<PolicyKind>>;
}

/// Convert a policy CRD into the kind to list
///
/// Lists the storage version, falling back to the first served one.
pub fn policy_kind_from_crd(crd: &CustomResourceDefinition) -> Option<PolicyKind> {
    let spec = &crd.spec;
    let version = spec
        .versions
        .iter()
        .find(|v| v.storage)
        .or_else(|| spec.versions.iter().find(|v| v.served))?;

    let mut kind = PolicyKind::new(&spec.group, &version.name, &spec.names.kind);
    kind.plural = Some(spec.names.plural.clone());
    kind.namespaced = spec.scope == "Namespaced";
    Some(kind)
}

// =============================================================================
// Kubernetes
// =============================================================================

/// Object store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    namespace: Option<String>,
}

impl KubeStore {
    /// Create a store listing across all namespaces
    pub fn new(client: Client) -> Self {
        Self {
            client,
            namespace: None,
        }
    }

    /// Create a store honouring the namespace restriction of a config
    pub fn for_config(client: Client, config: &DiscoveryConfig) -> Self {
        Self {
            client,
            namespace: config.namespace.clone(),
        }
    }

    fn api_for(&self, kind: &KindDescriptor) -> Api<DynamicObject> {
        let ar = api_resource_for(kind);
        match (&self.namespace, kind.namespaced) {
            (Some(ns), true) => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn list(&self, kind: &KindDescriptor) -> Result<Vec<DynamicObject>> {
        let api = self.api_for(kind);
        match api.list(&ListParams::default()).await {
            Ok(list) => {
                debug!(kind = %kind.kind, count = list.items.len(), "listed objects");
                Ok(list.items)
            }
            // CRD not installed
            Err(kube::Error::Api(e)) if e.code == 404 => {
                warn!(kind = %kind.kind, api_version = %kind.api_version, "kind not served, treating as empty");
                Ok(Vec::new())
            }
            Err(kube::Error::Api(e)) if e.code == 401 || e.code == 403 => {
                Err(Error::fetch_permanent(kind.kind.to_string(), e.message))
            }
            Err(e) => Err(Error::fetch_for_kind(kind.kind.to_string(), e.to_string())),
        }
    }

    async fn policy_kinds(&self) -> Result<Vec<PolicyKind>> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let crds = api
            .list(&ListParams::default().labels(POLICY_LABEL_KEY))
            .await?;

        let kinds: Vec<PolicyKind> = crds.items.iter().filter_map(policy_kind_from_crd).collect();
        debug!(count = kinds.len(), "discovered policy CRDs");
        Ok(kinds)
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Object store serving objects held in memory
#[derive(Clone, Debug, Default)]
pub struct StaticStore {
    objects: BTreeMap<GroupKind, Vec<DynamicObject>>,
    policy_kinds: Vec<PolicyKind>,
}

impl StaticStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy kind so that manifests of that kind are accepted
    pub fn with_policy_kind(mut self, kind: PolicyKind) -> Self {
        self.register_policy_kind(kind);
        self
    }

    fn register_policy_kind(&mut self, kind: PolicyKind) {
        if !self.policy_kinds.iter().any(|k| k.group_kind() == kind.group_kind()) {
            self.policy_kinds.push(kind);
        }
    }

    /// Add an object under a kind
    pub fn insert(&mut self, kind: &ResourceKind, object: DynamicObject) {
        self.objects.entry(kind.group_kind()).or_default().push(object);
    }

    /// Load a store from multi-document YAML
    pub fn from_yaml(input: &str) -> Result<Self> {
        let mut store = Self::new();
        store.load_yaml(input)?;
        Ok(store)
    }

    /// Add every document of a multi-document YAML manifest
    ///
    /// Policy CRDs in the manifest register their kind. Documents of kinds
    /// that are neither built in nor registered are skipped. Returns how many
    /// objects were added.
    pub fn load_yaml(&mut self, input: &str) -> Result<usize> {
        let mut documents = parse_yaml_documents(input)?;
        // A document without metadata still lists; discovery reports it as invalid
        for doc in &mut documents {
            if let Some(fields) = doc.as_object_mut() {
                fields
                    .entry("metadata")
                    .or_insert_with(|| Value::Object(Map::new()));
            }
        }

        // Register CRDs first so their objects may appear anywhere
        for doc in &documents {
            if doc.get("kind").and_then(Value::as_str) == Some("CustomResourceDefinition") {
                let crd: CustomResourceDefinition = serde_json::from_value(doc.clone())
                    .map_err(|e| Error::serialization_for_kind("CustomResourceDefinition", e.to_string()))?;
                let labelled = crd
                    .metadata
                    .labels
                    .as_ref()
                    .is_some_and(|labels| labels.contains_key(POLICY_LABEL_KEY));
                if labelled {
                    if let Some(kind) = policy_kind_from_crd(&crd) {
                        self.register_policy_kind(kind);
                    }
                }
            }
        }

        let mut added = 0;
        for doc in documents {
            let Some(kind) = self.classify(&doc) else {
                continue;
            };
            let namespaced = match &kind {
                ResourceKind::Policy(gk) => self
                    .policy_kinds
                    .iter()
                    .any(|k| &k.group_kind() == gk && k.namespaced),
                other => !other.is_cluster_scoped(),
            };
            let mut object: DynamicObject = serde_json::from_value(doc)
                .map_err(|e| Error::serialization_for_kind(kind.to_string(), e.to_string()))?;
            if namespaced && object.metadata.namespace.is_none() {
                object.metadata.namespace = Some(DEFAULT_NAMESPACE.to_string());
            }
            self.insert(&kind, object);
            added += 1;
        }
        Ok(added)
    }

    fn classify(&self, doc: &Value) -> Option<ResourceKind> {
        let api_version = doc.get("apiVersion").and_then(Value::as_str)?;
        let kind = doc.get("kind").and_then(Value::as_str)?;
        let (group, _) = parse_api_version(api_version);

        match ResourceKind::from_group_kind(&group, kind) {
            ResourceKind::Other(gk) => {
                if self.policy_kinds.iter().any(|k| k.group_kind() == gk) {
                    Some(ResourceKind::Policy(gk))
                } else {
                    debug!(kind = %gk, "skipping manifest of unsupported kind");
                    None
                }
            }
            known => Some(known),
        }
    }
}

#[async_trait]
impl ObjectStore for StaticStore {
    async fn list(&self, kind: &KindDescriptor) -> Result<Vec<DynamicObject>> {
        Ok(self
            .objects
            .get(&kind.kind.group_kind())
            .cloned()
            .unwrap_or_default())
    }

    async fn policy_kinds(&self) -> Result<Vec<PolicyKind>> {
        Ok(self.policy_kinds.clone())
    }
}
