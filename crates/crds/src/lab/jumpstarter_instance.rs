//! JumpstarterInstance: a control plane the lab registers clients and exporters with

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// JumpstarterInstanceSpec locates a control plane
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "meta.jumpstarter.dev",
    version = "v1alpha1",
    kind = "JumpstarterInstance",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct JumpstarterInstanceSpec {
    /// Context to select from the kubeconfig
    #[serde(default, rename = "kube-context", skip_serializing_if = "Option::is_none")]
    pub kube_context: Option<String>,

    /// Inline kubeconfig; `KUBECONFIG` / `~/.kube/config` is used when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,

    /// gRPC endpoints; the first is handed to exporters as `$(params.endpoint)`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,

    /// Namespace holding Clients and Exporters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl JumpstarterInstance {
    /// Namespace for control-plane objects, if configured
    pub fn target_namespace(&self) -> Option<&str> {
        self.spec.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// First configured endpoint
    pub fn primary_endpoint(&self) -> Option<&str> {
        self.spec.endpoints.first().map(String::as_str)
    }
}

templating::templatable!(resource JumpstarterInstance);
templating::templatable!(JumpstarterInstanceSpec { kube_context, kubeconfig, endpoints, namespace, notes });
