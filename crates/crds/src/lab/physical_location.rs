//! PhysicalLocation: a lab room or site

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PhysicalLocationSpec describes a location hosts and devices refer to
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "meta.jumpstarter.dev",
    version = "v1alpha1",
    kind = "PhysicalLocation",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalLocationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Street address or building reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

templating::templatable!(resource PhysicalLocation);
templating::templatable!(PhysicalLocationSpec { description, address, notes });
