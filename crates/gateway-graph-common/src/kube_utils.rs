//! Kubernetes client helpers using kube-rs
//!
//! Builds `ApiResource`s for untyped listing and creates clients with
//! bounded connect/read timeouts, so that a stalled API server surfaces as a
//! fetch failure instead of hanging a discovery pass.

use std::path::Path;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};

use crate::resource::KindDescriptor;
use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Split an apiVersion into (group, version)
///
/// Core resources use a bare version ("v1") and map to the empty group.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an `ApiResource` from an apiVersion and kind
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Build the `ApiResource` used to list a kind
pub fn api_resource_for(descriptor: &KindDescriptor) -> ApiResource {
    let mut ar = build_api_resource(&descriptor.api_version, descriptor.kind.kind_name());
    if let Some(plural) = &descriptor.plural {
        ar.plural = plural.clone();
    }
    ar
}

/// Known kind -> plural mappings that the suffix rules get wrong or that are
/// common enough to pin down
const KIND_PLURALS: &[(&str, &str)] = &[
    ("gatewayclass", "gatewayclasses"),
    ("gateway", "gateways"),
    ("httproute", "httproutes"),
    ("grpcroute", "grpcroutes"),
    ("tcproute", "tcproutes"),
    ("tlsroute", "tlsroutes"),
    ("referencegrant", "referencegrants"),
    ("service", "services"),
    ("namespace", "namespaces"),
    ("serviceimport", "serviceimports"),
];

/// Pluralize a Kubernetes resource kind
///
/// Uses a lookup table for known Gateway API and core kinds, falling back to
/// English suffix rules ("BackendTLSPolicy" -> "backendtlspolicies").
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Create a kube client from an optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from an optional kubeconfig path with custom timeouts
///
/// Without a path, the config is inferred (in-cluster, then `KUBECONFIG`).
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };

    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);

    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}
