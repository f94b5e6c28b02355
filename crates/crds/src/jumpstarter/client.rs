//! Client Custom Resource Definition

use crate::references::LocalReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ClientSpec defines the desired state of a Jumpstarter client
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "jumpstarter.dev",
    version = "v1alpha1",
    kind = "Client",
    namespaced,
    status = "ClientStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClientSpec {
    /// OIDC username bound to this client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// ClientStatus is written by the Jumpstarter controller
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    /// Secret holding the issued client token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<LocalReference>,

    /// Endpoint the client should connect to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}
