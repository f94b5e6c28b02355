//! Exporter Custom Resource Definition

use crate::references::LocalReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ExporterSpec defines the desired state of a Jumpstarter exporter
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "jumpstarter.dev",
    version = "v1alpha1",
    kind = "Exporter",
    namespaced,
    status = "ExporterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ExporterSpec {
    /// OIDC username bound to this exporter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// ExporterStatus is written by the Jumpstarter controller
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExporterStatus {
    /// Secret holding the issued exporter token (key `token`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<LocalReference>,

    /// Devices reported by the running exporter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<Device>,

    /// Lease currently holding the exporter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_ref: Option<LocalReference>,

    /// Last time the exporter reported in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,

    /// Endpoint the exporter should connect to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Device exposed by an exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device UUID
    #[serde(default)]
    pub uuid: String,

    /// UUID of the parent device, if nested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,

    /// Device labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}
