//! ExporterAccessPolicy Custom Resource Definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ExporterAccessPolicySpec grants clients access to a set of exporters
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "jumpstarter.dev",
    version = "v1alpha1",
    kind = "ExporterAccessPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ExporterAccessPolicySpec {
    /// Exporters this policy applies to
    #[serde(default)]
    pub exporter_selector: Selector,

    /// Policies evaluated in priority order
    #[serde(default)]
    pub policies: Vec<Policy>,
}

/// A single access rule
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Higher priority wins
    #[serde(default)]
    pub priority: i32,

    /// Clients the rule applies to
    #[serde(default)]
    pub from: Vec<PolicySubject>,

    /// Maximum lease duration (e.g. `24h`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_duration: Option<String>,

    /// Whether leases may be preempted
    #[serde(default)]
    pub spot_access: bool,
}

/// Subject of an access rule
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicySubject {
    /// Clients selected by label
    #[serde(default)]
    pub client_selector: Selector,
}

/// Label selector
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    /// Exact label matches
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    /// Set-based requirements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<SelectorRequirement>,
}

/// Set-based label requirement
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectorRequirement {
    /// Label key
    pub key: String,
    /// `In`, `NotIn`, `Exists` or `DoesNotExist`
    pub operator: String,
    /// Values for `In` / `NotIn`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}
