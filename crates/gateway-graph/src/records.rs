//! Fetched records
//!
//! A [`Record`] wraps one raw object from the store together with the
//! references it declares toward other resources. Parsing is the only place
//! that knows about individual kinds; the graph builder and the policy
//! resolver only see identities and references.

use std::collections::BTreeMap;

use kube::api::DynamicObject;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use gateway_graph_common::network::gateway_api::{
    GatewayClassSpec, GatewaySpec, PolicyTargetReference, RouteSpec,
};
use gateway_graph_common::{Error, ObjectKey, ObjectRef, ResourceKind, Result};

/// Derive the identity of a raw object
///
/// Fails when the object has no name, or is of a namespaced kind but carries
/// no namespace.
pub fn object_key(kind: &ResourceKind, object: &DynamicObject) -> Result<ObjectKey> {
    let name = object
        .metadata
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::serialization_for_kind(kind.to_string(), "missing metadata.name"))?;

    if kind.is_cluster_scoped() {
        return Ok(ObjectKey::cluster(kind.clone(), name));
    }

    let namespace = object
        .metadata
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| {
            Error::serialization_for_kind(
                kind.to_string(),
                format!("{} has no metadata.namespace", name),
            )
        })?;
    Ok(ObjectKey::new(kind.clone(), namespace, name))
}

/// A missing spec parses as an empty one, so only required fields fail
fn parse_spec<T: DeserializeOwned>(kind: &ResourceKind, object: &DynamicObject) -> Result<T> {
    let spec = object
        .data
        .get("spec")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(spec)
        .map_err(|e| Error::serialization_for_kind(kind.to_string(), format!("invalid spec: {}", e)))
}

/// One fetched resource and the references it declares
#[derive(Clone, Debug)]
pub struct Record {
    /// Identity of the resource
    pub key: ObjectKey,
    /// Raw object as returned by the store (spec and status are opaque)
    pub object: DynamicObject,
    /// Resources this one declares as its parents
    pub parent_refs: Vec<ObjectRef>,
    /// Resources this one declares as its children (e.g., route backends)
    pub child_refs: Vec<ObjectRef>,
}

impl Record {
    /// Create a record without declared references
    pub fn new(key: ObjectKey, object: DynamicObject) -> Self {
        Self {
            key,
            object,
            parent_refs: Vec::new(),
            child_refs: Vec::new(),
        }
    }

    /// Add a declared parent reference
    pub fn with_parent(mut self, reference: ObjectRef) -> Self {
        self.parent_refs.push(reference);
        self
    }

    /// Add a declared child reference
    pub fn with_child(mut self, reference: ObjectRef) -> Self {
        self.child_refs.push(reference);
        self
    }

    /// Parse a raw object of the given kind, extracting its references
    ///
    /// - Gateway: `spec.gatewayClassName` is its parent
    /// - HTTPRoute / GRPCRoute: `spec.parentRefs` are its parents and the
    ///   `backendRefs` of every rule are its children
    /// - GatewayClass: no references; a present spec must carry
    ///   `spec.controllerName`
    /// - Namespace, Service: no references
    pub fn from_object(kind: ResourceKind, object: DynamicObject) -> Result<Self> {
        let key = object_key(&kind, &object)?;
        let mut record = Self::new(key, object);

        match &kind {
            ResourceKind::GatewayClass => {
                if record.spec().is_some() {
                    let _: GatewayClassSpec = parse_spec(&kind, &record.object)?;
                }
            }
            ResourceKind::Gateway => {
                let spec: GatewaySpec = parse_spec(&kind, &record.object)?;
                record.parent_refs.push(spec.class_ref());
            }
            route if route.is_route() => {
                let spec: RouteSpec = parse_spec(&kind, &record.object)?;
                record.parent_refs = spec.parent_object_refs(&record.key.namespace);
                record.child_refs = spec.backend_object_refs(&record.key.namespace);
            }
            ResourceKind::Policy(_) => {
                return Err(Error::serialization_for_kind(
                    kind.to_string(),
                    "policy objects are parsed with PolicyRecord::from_object",
                ));
            }
            _ => {}
        }

        Ok(record)
    }

    /// Raw `spec` of the object, if any
    pub fn spec(&self) -> Option<&Value> {
        self.object.data.get("spec")
    }

    /// Raw `status` of the object, if any
    pub fn status(&self) -> Option<&Value> {
        self.object.data.get("status")
    }

    /// Labels of the object
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.object.metadata.labels.clone().unwrap_or_default()
    }
}

/// A fetched policy object and its single target reference
#[derive(Clone, Debug)]
pub struct PolicyRecord {
    /// Identity of the policy
    pub key: ObjectKey,
    /// Target the policy attaches to
    pub target: ObjectRef,
    /// Policy spec without `targetRef`; never interpreted by the engine
    pub payload: Value,
    /// Raw object as returned by the store
    pub object: DynamicObject,
}

impl PolicyRecord {
    /// Parse a raw policy object of a policy kind
    pub fn from_object(kind: ResourceKind, object: DynamicObject) -> Result<Self> {
        if !kind.is_policy() {
            return Err(Error::serialization_for_kind(
                kind.to_string(),
                "not a policy kind",
            ));
        }
        let key = object_key_lenient(&kind, &object)?;

        let mut payload = object.data.get("spec").cloned().unwrap_or(Value::Null);
        let target_value = payload
            .as_object_mut()
            .and_then(|spec| spec.remove("targetRef"))
            .ok_or_else(|| {
                Error::serialization_for_kind(kind.to_string(), format!("{} has no spec.targetRef", key))
            })?;
        let target: PolicyTargetReference = serde_json::from_value(target_value).map_err(|e| {
            Error::serialization_for_kind(
                kind.to_string(),
                format!("{} has an invalid spec.targetRef: {}", key, e),
            )
        })?;

        Ok(Self {
            target: target.to_object_ref(&key.namespace),
            key,
            payload,
            object,
        })
    }

    /// Create a policy record directly from its parts
    pub fn new(key: ObjectKey, target: ObjectRef, payload: Value) -> Self {
        let mut object = DynamicObject {
            types: None,
            metadata: Default::default(),
            data: Value::Null,
        };
        object.metadata.name = Some(key.name.clone());
        if !key.namespace.is_empty() {
            object.metadata.namespace = Some(key.namespace.clone());
        }
        Self {
            key,
            target,
            payload,
            object,
        }
    }
}

/// Policy CRDs may be cluster-scoped, so a policy without a namespace is valid
fn object_key_lenient(kind: &ResourceKind, object: &DynamicObject) -> Result<ObjectKey> {
    let name = object
        .metadata
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::serialization_for_kind(kind.to_string(), "missing metadata.name"))?;
    let namespace = object.metadata.namespace.clone().unwrap_or_default();
    Ok(ObjectKey::new(kind.clone(), namespace, name))
}
