//! Resource identity types
//!
//! Every object that participates in the graph is identified by
//! (kind, namespace, name). References between objects carry the same three
//! fields plus an optional section name, and are resolved against fetched
//! identities by the graph engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// API group of the Kubernetes Gateway API
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";

/// API version used to list Gateway API resources
pub const GATEWAY_API_VERSION: &str = "gateway.networking.k8s.io/v1";

/// Core (legacy) API group, written as the empty string
pub const CORE_GROUP: &str = "";

/// Label placed on policy CRDs by the Gateway API policy attachment model
pub const POLICY_LABEL_KEY: &str = "gateway.networking.k8s.io/policy";

/// An API group and kind pair
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKind {
    /// API group ("" for core)
    pub group: String,
    /// Kind name (e.g., "HealthCheckPolicy")
    pub kind: String,
}

impl GroupKind {
    /// Create a new group/kind pair
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Kind of a resource participating in the graph
///
/// The built-in variants are the resources the graph links by parentage.
/// `Policy` marks a policy object of a registered policy CRD, and `Other`
/// holds any group/kind that a reference names but the graph never fetches.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// gateway.networking.k8s.io GatewayClass (cluster-scoped)
    GatewayClass,
    /// core Namespace (cluster-scoped)
    Namespace,
    /// gateway.networking.k8s.io Gateway
    Gateway,
    /// gateway.networking.k8s.io HTTPRoute
    HttpRoute,
    /// gateway.networking.k8s.io GRPCRoute
    GrpcRoute,
    /// core Service, the default backend kind
    Service,
    /// A policy object of a policy CRD
    Policy(GroupKind),
    /// A group/kind not fetched by discovery
    Other(GroupKind),
}

impl ResourceKind {
    /// Built-in kinds fetched on every discovery pass, parents before children
    pub const BUILTIN: [ResourceKind; 6] = [
        ResourceKind::GatewayClass,
        ResourceKind::Namespace,
        ResourceKind::Gateway,
        ResourceKind::HttpRoute,
        ResourceKind::GrpcRoute,
        ResourceKind::Service,
    ];

    /// Map a group/kind pair onto a built-in kind, or `Other` if unknown
    pub fn from_group_kind(group: &str, kind: &str) -> Self {
        match (group, kind) {
            (GATEWAY_API_GROUP, "GatewayClass") => Self::GatewayClass,
            (GATEWAY_API_GROUP, "Gateway") => Self::Gateway,
            (GATEWAY_API_GROUP, "HTTPRoute") => Self::HttpRoute,
            (GATEWAY_API_GROUP, "GRPCRoute") => Self::GrpcRoute,
            (CORE_GROUP, "Namespace") => Self::Namespace,
            (CORE_GROUP, "Service") => Self::Service,
            _ => Self::Other(GroupKind::new(group, kind)),
        }
    }

    /// API group of this kind
    pub fn group(&self) -> &str {
        match self {
            Self::GatewayClass | Self::Gateway | Self::HttpRoute | Self::GrpcRoute => {
                GATEWAY_API_GROUP
            }
            Self::Namespace | Self::Service => CORE_GROUP,
            Self::Policy(gk) | Self::Other(gk) => &gk.group,
        }
    }

    /// Kind name as written in manifests (e.g., "HTTPRoute")
    pub fn kind_name(&self) -> &str {
        match self {
            Self::GatewayClass => "GatewayClass",
            Self::Namespace => "Namespace",
            Self::Gateway => "Gateway",
            Self::HttpRoute => "HTTPRoute",
            Self::GrpcRoute => "GRPCRoute",
            Self::Service => "Service",
            Self::Policy(gk) | Self::Other(gk) => &gk.kind,
        }
    }

    /// API version used to list a built-in kind
    ///
    /// Returns `None` for policy and unknown kinds, whose version comes from
    /// their CRD.
    pub fn api_version(&self) -> Option<&'static str> {
        match self {
            Self::GatewayClass | Self::Gateway | Self::HttpRoute | Self::GrpcRoute => {
                Some(GATEWAY_API_VERSION)
            }
            Self::Namespace | Self::Service => Some("v1"),
            Self::Policy(_) | Self::Other(_) => None,
        }
    }

    /// Whether objects of this kind live outside any namespace
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, Self::GatewayClass | Self::Namespace)
    }

    /// Whether this kind is a route (HTTPRoute or GRPCRoute)
    pub fn is_route(&self) -> bool {
        matches!(self, Self::HttpRoute | Self::GrpcRoute)
    }

    /// Whether this kind is a policy object
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::Policy(_))
    }

    /// Group/kind pair of this kind
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group(), self.kind_name())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy(gk) | Self::Other(gk) => write!(f, "{}", gk),
            _ => f.write_str(self.kind_name()),
        }
    }
}

/// Identity of a resource: (kind, namespace, name)
///
/// Cluster-scoped kinds always carry an empty namespace so that identities
/// compare equal regardless of how a reference spelled them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Resource kind
    pub kind: ResourceKind,
    /// Namespace (empty for cluster-scoped kinds)
    pub namespace: String,
    /// Resource name
    pub name: String,
}

impl ObjectKey {
    /// Create an identity, normalizing the namespace of cluster-scoped kinds
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = if kind.is_cluster_scoped() {
            String::new()
        } else {
            namespace.into()
        };
        Self {
            kind,
            namespace,
            name: name.into(),
        }
    }

    /// Identity of a cluster-scoped resource
    pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::new(kind, "", name)
    }

    /// Identity of the Namespace object this resource lives in
    ///
    /// Returns `None` for cluster-scoped resources.
    pub fn namespace_key(&self) -> Option<ObjectKey> {
        if self.kind.is_cluster_scoped() || self.namespace.is_empty() {
            return None;
        }
        Some(ObjectKey::cluster(
            ResourceKind::Namespace,
            self.namespace.clone(),
        ))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// A declared reference from one resource to another
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// Expected kind of the referenced resource
    pub kind: ResourceKind,
    /// Namespace of the referenced resource (empty for cluster-scoped kinds)
    pub namespace: String,
    /// Name of the referenced resource
    pub name: String,
    /// Optional field selector within the referenced resource (e.g., a listener)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

impl ObjectRef {
    /// Create a reference to a whole resource
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
            section_name: None,
        }
    }

    /// Narrow the reference to a named section of the target
    pub fn with_section(mut self, section_name: impl Into<String>) -> Self {
        self.section_name = Some(section_name.into());
        self
    }

    /// Identity this reference points at
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind.clone(), self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section_name {
            Some(section) => write!(f, "{}#{}", self.key(), section),
            None => write!(f, "{}", self.key()),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A policy CRD registered for discovery
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyKind {
    /// API group of the policy CRD
    pub group: String,
    /// API version to list (the CRD's storage version)
    pub version: String,
    /// Kind name
    pub kind: String,
    /// Plural resource name; derived from the kind when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    /// Whether policy objects are namespaced
    #[serde(default = "default_true")]
    pub namespaced: bool,
}

impl PolicyKind {
    /// Create a namespaced policy kind
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: None,
            namespaced: true,
        }
    }

    /// Group/kind identity of this policy kind
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group.clone(), self.kind.clone())
    }

    /// Resource kind assigned to policy objects of this CRD
    pub fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Policy(self.group_kind())
    }

    /// apiVersion string ("group/version", or just "version" for core)
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Everything an object store needs to list one kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindDescriptor {
    /// Kind being listed
    pub kind: ResourceKind,
    /// apiVersion to request
    pub api_version: String,
    /// Plural resource name, if it differs from the derived one
    pub plural: Option<String>,
    /// Whether the kind is namespaced
    pub namespaced: bool,
}

impl KindDescriptor {
    /// Descriptor for a built-in kind
    ///
    /// Returns `None` for policy and unknown kinds.
    pub fn builtin(kind: ResourceKind) -> Option<Self> {
        let api_version = kind.api_version()?.to_string();
        let namespaced = !kind.is_cluster_scoped();
        Some(Self {
            kind,
            api_version,
            plural: None,
            namespaced,
        })
    }

    /// Descriptor for a registered policy kind
    pub fn policy(policy_kind: &PolicyKind) -> Self {
        Self {
            kind: policy_kind.resource_kind(),
            api_version: policy_kind.api_version(),
            plural: policy_kind.plural.clone(),
            namespaced: policy_kind.namespaced,
        }
    }
}
