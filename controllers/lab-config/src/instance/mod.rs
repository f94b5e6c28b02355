//! Jumpstarter control-plane sync
//!
//! An [`Instance`] wraps one `JumpstarterInstance` from the lab config and a
//! [`ControlPlaneClientTrait`] connected to it. Clients and exporters are
//! reconciled through the generic core in [`crate::reconcile`]; exporters
//! additionally wait for the control plane to issue their credentials.

pub mod client_sync;
pub mod exporter_sync;
pub mod kubeconfig;
mod object;

use crate::error::LabConfigError;
use crate::reconcile::SyncOptions;
use crds::JumpstarterInstance;
use jumpstarter_client::{ControlPlaneClientTrait, ControlPlaneError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Annotation stamped on every object this tool creates or updates
pub const MANAGED_BY_ANNOTATION: &str = "managed-by";
/// Value of [`MANAGED_BY_ANNOTATION`]
pub const MANAGED_BY_VALUE: &str = "jumpstarter-lab-config";

/// A connected Jumpstarter control plane
pub struct Instance {
    config: JumpstarterInstance,
    client: Arc<dyn ControlPlaneClientTrait>,
    options: SyncOptions,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name())
            .field("namespace", &self.namespace())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Instance {
    /// Connect using the instance's kubeconfig and context
    pub async fn connect(config: JumpstarterInstance, options: SyncOptions) -> Result<Self, LabConfigError> {
        let client = kubeconfig::connect(&config).await?;
        Ok(Self::new(config, Arc::new(client), options))
    }

    /// Wrap an existing control-plane client
    pub fn new(config: JumpstarterInstance, client: Arc<dyn ControlPlaneClientTrait>, options: SyncOptions) -> Self {
        Self {
            config,
            client,
            options,
        }
    }

    /// Name of the JumpstarterInstance
    pub fn name(&self) -> &str {
        self.config.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace holding Clients and Exporters; `None` means all namespaces
    pub fn namespace(&self) -> Option<&str> {
        self.config.target_namespace()
    }

    /// JumpstarterInstance this wraps
    pub fn config(&self) -> &JumpstarterInstance {
        &self.config
    }

    /// Dry-run and prune switches every sync on this instance uses
    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub(crate) fn client(&self) -> &dyn ControlPlaneClientTrait {
        self.client.as_ref()
    }

    /// Merge `annotations` into `metadata`, stamp the managed-by annotation
    /// and default the namespace to the instance namespace
    pub fn prepare_metadata(&self, metadata: &mut ObjectMeta, annotations: Option<&BTreeMap<String, String>>) {
        let merged = metadata.annotations.get_or_insert_with(BTreeMap::new);
        if let Some(annotations) = annotations {
            merged.extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged.insert(MANAGED_BY_ANNOTATION.to_string(), MANAGED_BY_VALUE.to_string());

        if metadata.namespace.as_deref().is_none_or(str::is_empty) {
            metadata.namespace = self.namespace().map(str::to_string);
        }
    }

    /// Namespace an object lives in: its own, else the instance namespace
    pub(crate) fn object_namespace(&self, metadata: &ObjectMeta, kind: &str) -> Result<String, LabConfigError> {
        metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .or(self.namespace())
            .map(str::to_string)
            .ok_or_else(|| {
                LabConfigError::InvalidConfig(format!(
                    "[{}] namespace is required for {kind} {}",
                    self.name(),
                    metadata.name.as_deref().unwrap_or_default()
                ))
            })
    }

    /// Wrap a control-plane error with the instance, operation and object
    pub(crate) fn error(
        &self,
        operation: &'static str,
        kind: &'static str,
        name: &str,
    ) -> impl FnOnce(ControlPlaneError) -> LabConfigError {
        let instance = self.name().to_string();
        let name = name.to_string();
        move |source| LabConfigError::ControlPlane {
            instance,
            operation,
            kind,
            name,
            source,
        }
    }
}

#[cfg(test)]
#[path = "instance_test.rs"]
mod tests;
