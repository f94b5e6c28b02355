//! ExporterConfigTemplate: file templates rendered per exporter instance

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ExporterConfigTemplateSpec holds the exporter config and systemd unit
/// templates. At most one of the container and service unit templates may be
/// non-empty.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "meta.jumpstarter.dev",
    version = "v1alpha1",
    kind = "ExporterConfigTemplate",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ExporterConfigTemplateSpec {
    /// Image exposed as `$(params.container_image)`
    #[serde(default)]
    pub container_image: String,

    /// Name and labels of the rendered exporter
    #[serde(default)]
    pub exporter_metadata: ExporterMeta,

    /// Exporter configuration file (`/etc/jumpstarter/exporters/<name>.yaml`)
    #[serde(default)]
    pub config_template: String,

    /// Podman quadlet unit (`/etc/containers/systemd/<name>.container`)
    #[serde(default)]
    pub systemd_container_template: String,

    /// Classic systemd unit (`/etc/systemd/system/<name>.service`)
    #[serde(default)]
    pub systemd_service_template: String,
}

/// Exporter name and labels
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExporterMeta {
    /// Service / file base name on the host
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

templating::templatable!(resource ExporterConfigTemplate);
templating::templatable!(ExporterConfigTemplateSpec {
    container_image,
    exporter_metadata,
    config_template,
    systemd_container_template,
    systemd_service_template,
});
templating::templatable!(ExporterMeta { name, labels });
