//! Gateway API spec fragments
//!
//! Only the fields the graph needs for linking are typed here: class names,
//! parent references, backend references and policy target references.
//! Everything else in a resource stays opaque and is carried as raw JSON.
//! Unknown fields are ignored so that newer API versions still parse.

use serde::{Deserialize, Serialize};

use crate::resource::{ObjectRef, ResourceKind, CORE_GROUP, GATEWAY_API_GROUP};

/// GatewayClass spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayClassSpec {
    /// Controller responsible for gateways of this class
    pub controller_name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Gateway spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// GatewayClass name (cluster-scoped)
    pub gateway_class_name: String,
    /// Listener configurations
    #[serde(default)]
    pub listeners: Vec<GatewayListener>,
}

impl GatewaySpec {
    /// Reference to the GatewayClass this gateway belongs to
    pub fn class_ref(&self) -> ObjectRef {
        ObjectRef::new(ResourceKind::GatewayClass, "", &self.gateway_class_name)
    }
}

/// Gateway listener
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayListener {
    /// Listener name
    pub name: String,
    /// Optional hostname filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Port number
    pub port: u16,
    /// Protocol (HTTP, HTTPS, TCP, etc.)
    pub protocol: String,
}

/// Spec shared by HTTPRoute and GRPCRoute, reduced to linking fields
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Gateways (or other parents) this route attaches to
    #[serde(default)]
    pub parent_refs: Vec<ParentReference>,
    /// Hostnames matched by this route
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Routing rules
    #[serde(default)]
    pub rules: Vec<RouteRule>,
}

impl RouteSpec {
    /// Parent references resolved against the route's namespace
    pub fn parent_object_refs(&self, route_namespace: &str) -> Vec<ObjectRef> {
        self.parent_refs
            .iter()
            .map(|r| r.to_object_ref(route_namespace))
            .collect()
    }

    /// Backend references of every rule resolved against the route's namespace
    ///
    /// A backend referenced by several rules is listed once.
    pub fn backend_object_refs(&self, route_namespace: &str) -> Vec<ObjectRef> {
        let mut refs: Vec<ObjectRef> = self
            .rules
            .iter()
            .flat_map(|rule| rule.backend_refs.iter())
            .map(|r| r.to_object_ref(route_namespace))
            .collect();
        refs.sort();
        refs.dedup();
        refs
    }
}

/// A routing rule, reduced to its backend references
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// Backends traffic is forwarded to
    #[serde(default)]
    pub backend_refs: Vec<BackendRef>,
}

/// Reference from a route to its parent
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    /// API group (default: gateway.networking.k8s.io)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Kind (default: Gateway)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Namespace (default: the route's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Parent name
    pub name: String,
    /// Listener name within the parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    /// Listener port within the parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ParentReference {
    /// Convert into a graph reference, applying Gateway API defaults
    pub fn to_object_ref(&self, route_namespace: &str) -> ObjectRef {
        let kind = ResourceKind::from_group_kind(
            self.group.as_deref().unwrap_or(GATEWAY_API_GROUP),
            self.kind.as_deref().unwrap_or("Gateway"),
        );
        ObjectRef {
            kind,
            namespace: self
                .namespace
                .clone()
                .unwrap_or_else(|| route_namespace.to_string()),
            name: self.name.clone(),
            section_name: self.section_name.clone(),
        }
    }
}

/// Reference from a route rule to a backend
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    /// API group (default: core)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Kind (default: Service)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Namespace (default: the route's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Backend name
    pub name: String,
    /// Backend port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Traffic weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

impl BackendRef {
    /// Convert into a graph reference, applying Gateway API defaults
    pub fn to_object_ref(&self, route_namespace: &str) -> ObjectRef {
        let kind = ResourceKind::from_group_kind(
            self.group.as_deref().unwrap_or(CORE_GROUP),
            self.kind.as_deref().unwrap_or("Service"),
        );
        ObjectRef::new(
            kind,
            self.namespace
                .clone()
                .unwrap_or_else(|| route_namespace.to_string()),
            self.name.clone(),
        )
    }
}

/// Policy `spec.targetRef`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTargetReference {
    /// API group of the target ("" for core)
    #[serde(default)]
    pub group: String,
    /// Kind of the target
    pub kind: String,
    /// Name of the target
    pub name: String,
    /// Namespace of the target (default: the policy's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Section of the target the policy applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

impl PolicyTargetReference {
    /// Convert into a graph reference
    ///
    /// Namespaced targets default to the policy's own namespace; the
    /// namespace of cluster-scoped targets is dropped.
    pub fn to_object_ref(&self, policy_namespace: &str) -> ObjectRef {
        let kind = ResourceKind::from_group_kind(&self.group, &self.kind);
        let namespace = if kind.is_cluster_scoped() {
            String::new()
        } else {
            self.namespace
                .clone()
                .unwrap_or_else(|| policy_namespace.to_string())
        };
        ObjectRef {
            kind,
            namespace,
            name: self.name.clone(),
            section_name: self.section_name.clone(),
        }
    }
}
