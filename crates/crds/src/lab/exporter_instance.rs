//! ExporterInstance: one exporter service bound to a host and a control plane

use crate::references::LocalReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ExporterInstanceSpec ties a device-under-test to a host, a control plane
/// and a config template
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "meta.jumpstarter.dev",
    version = "v1alpha1",
    kind = "ExporterInstance",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ExporterInstanceSpec {
    /// Free-form exporter type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub exporter_type: Option<String>,

    /// OIDC username copied to the control-plane Exporter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Where the device under test sits
    #[serde(default)]
    pub dut_location_ref: LocalReference,

    /// ExporterHost running this exporter
    #[serde(default)]
    pub exporter_host_ref: LocalReference,

    /// JumpstarterInstance the exporter registers with
    #[serde(default)]
    pub jumpstarter_instance_ref: LocalReference,

    /// ExporterConfigTemplate used to render host files
    #[serde(default)]
    pub config_template_ref: ConfigTemplateRef,

    /// Labels applied to the control-plane Exporter
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Reference to an ExporterConfigTemplate plus its `$(params.x)` values
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigTemplateRef {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl ExporterInstance {
    /// Whether host files are rendered for this instance
    pub fn has_config_template(&self) -> bool {
        !self.spec.config_template_ref.name.is_empty()
    }
}

templating::templatable!(resource ExporterInstance);
templating::templatable!(ExporterInstanceSpec {
    exporter_type,
    username,
    dut_location_ref,
    exporter_host_ref,
    jumpstarter_instance_ref,
    config_template_ref,
    labels,
    notes,
});
templating::templatable!(ConfigTemplateRef { name, parameters });
