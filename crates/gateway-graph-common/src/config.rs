//! Discovery configuration
//!
//! Configuration can be built in code, loaded from a YAML file, or read from
//! environment variables. All fields have defaults, so an empty document is
//! a valid configuration.
//!
//! ```yaml
//! namespace: prod
//! duplicatePolicy: KeepFirst
//! discoverPolicyCrds: true
//! policyKinds:
//!   - group: foo.com
//!     version: v1alpha1
//!     kind: HealthCheckPolicy
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::resource::PolicyKind;
use crate::{yaml, Error};

/// Environment variable restricting namespaced listings to one namespace
pub const ENV_NAMESPACE: &str = "GATEWAY_GRAPH_NAMESPACE";

/// Environment variable selecting the duplicate-identity policy
pub const ENV_DUPLICATE_POLICY: &str = "GATEWAY_GRAPH_DUPLICATE_POLICY";

/// Which record wins when two fetched records share an identity
///
/// The losing record is left out of the graph and the conflict is reported
/// as a structural error either way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Keep the first record seen; later ones are ignored
    #[default]
    KeepFirst,
    /// Keep the last record seen; it replaces earlier ones
    KeepLast,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keepfirst" | "keep-first" | "first" => Ok(Self::KeepFirst),
            "keeplast" | "keep-last" | "last" => Ok(Self::KeepLast),
            other => Err(Error::config_for_field(
                "duplicatePolicy",
                format!("unknown duplicate policy '{}'", other),
            )),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Configuration for one discovery pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    /// Restrict namespaced listings to this namespace (None = all namespaces)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Which record to keep when identities collide
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Policy CRDs to fetch in addition to discovered ones
    #[serde(default)]
    pub policy_kinds: Vec<PolicyKind>,

    /// Discover policy CRDs by the Gateway API policy label
    #[serde(default = "default_true")]
    pub discover_policy_crds: bool,

    /// Fetch GRPCRoutes alongside HTTPRoutes
    #[serde(default = "default_true")]
    pub include_grpc_routes: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            duplicate_policy: DuplicatePolicy::default(),
            policy_kinds: Vec::new(),
            discover_policy_crds: true,
            include_grpc_routes: true,
        }
    }
}

impl DiscoveryConfig {
    /// Parse a configuration from a YAML document
    pub fn from_yaml(input: &str) -> Result<Self, Error> {
        let value = yaml::parse_yaml(input)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("invalid discovery config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Build a configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(namespace) = lookup(ENV_NAMESPACE).filter(|ns| !ns.is_empty()) {
            config.namespace = Some(namespace);
        }
        if let Some(policy) = lookup(ENV_DUPLICATE_POLICY) {
            config.duplicate_policy = policy.parse()?;
        }
        Ok(config)
    }

    /// Reject configurations that could not produce a meaningful fetch
    pub fn validate(&self) -> Result<(), Error> {
        if matches!(&self.namespace, Some(ns) if ns.is_empty()) {
            return Err(Error::config_for_field(
                "namespace",
                "must not be empty when set",
            ));
        }

        let mut seen = HashSet::new();
        for (i, pk) in self.policy_kinds.iter().enumerate() {
            if pk.kind.is_empty() {
                return Err(Error::config_for_field(
                    format!("policyKinds[{}].kind", i),
                    "must not be empty",
                ));
            }
            if pk.version.is_empty() {
                return Err(Error::config_for_field(
                    format!("policyKinds[{}].version", i),
                    "must not be empty",
                ));
            }
            if !seen.insert(pk.group_kind()) {
                return Err(Error::config_for_field(
                    format!("policyKinds[{}]", i),
                    format!("duplicate policy kind {}", pk.group_kind()),
                ));
            }
        }
        Ok(())
    }
}
