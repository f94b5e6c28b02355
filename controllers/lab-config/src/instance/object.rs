//! Control-plane objects as a reconcile target
//!
//! [`ObjectTarget`] adapts an [`Instance`] to [`SyncTarget`] for any
//! [`ManagedObject`] kind. Updates copy spec and labels from the desired object
//! onto the live one, so the live `resourceVersion` is kept, and are retried
//! on optimistic-concurrency conflicts.

use super::Instance;
use crate::backoff::{CONFLICT_RETRY_ATTEMPTS, ExponentialBackoff};
use crate::diff::object_diff;
use crate::error::LabConfigError;
use crate::reconcile::SyncTarget;
use crds::{Client, Exporter};
use jumpstarter_client::{ControlPlaneClientTrait, ControlPlaneError};
use kube::Resource;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// A Jumpstarter kind the sync manages
#[async_trait::async_trait]
pub(crate) trait ManagedObject: Resource<DynamicType = ()> + Clone + Serialize + Send + Sync + 'static {
    /// Kind label for logs and errors
    const KIND: &'static str;

    /// Copy the fields this tool owns (spec and labels) from `desired`
    fn copy_desired(&mut self, desired: &Self);

    async fn list(client: &dyn ControlPlaneClientTrait, namespace: Option<&str>) -> Result<Vec<Self>, ControlPlaneError>;
    async fn get(client: &dyn ControlPlaneClientTrait, namespace: &str, name: &str) -> Result<Self, ControlPlaneError>;
    async fn create(client: &dyn ControlPlaneClientTrait, object: &Self) -> Result<Self, ControlPlaneError>;
    async fn update(client: &dyn ControlPlaneClientTrait, object: &Self) -> Result<Self, ControlPlaneError>;
    async fn delete(client: &dyn ControlPlaneClientTrait, namespace: &str, name: &str) -> Result<(), ControlPlaneError>;
}

#[async_trait::async_trait]
impl ManagedObject for Client {
    const KIND: &'static str = "client";

    fn copy_desired(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
        self.metadata.labels = desired.metadata.labels.clone();
    }

    async fn list(client: &dyn ControlPlaneClientTrait, namespace: Option<&str>) -> Result<Vec<Self>, ControlPlaneError> {
        client.list_clients(namespace).await
    }

    async fn get(client: &dyn ControlPlaneClientTrait, namespace: &str, name: &str) -> Result<Self, ControlPlaneError> {
        client.get_client(namespace, name).await
    }

    async fn create(client: &dyn ControlPlaneClientTrait, object: &Self) -> Result<Self, ControlPlaneError> {
        client.create_client(object).await
    }

    async fn update(client: &dyn ControlPlaneClientTrait, object: &Self) -> Result<Self, ControlPlaneError> {
        client.update_client(object).await
    }

    async fn delete(client: &dyn ControlPlaneClientTrait, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
        client.delete_client(namespace, name).await
    }
}

#[async_trait::async_trait]
impl ManagedObject for Exporter {
    const KIND: &'static str = "exporter";

    fn copy_desired(&mut self, desired: &Self) {
        self.spec = desired.spec.clone();
        self.metadata.labels = desired.metadata.labels.clone();
    }

    async fn list(client: &dyn ControlPlaneClientTrait, namespace: Option<&str>) -> Result<Vec<Self>, ControlPlaneError> {
        client.list_exporters(namespace).await
    }

    async fn get(client: &dyn ControlPlaneClientTrait, namespace: &str, name: &str) -> Result<Self, ControlPlaneError> {
        client.get_exporter(namespace, name).await
    }

    async fn create(client: &dyn ControlPlaneClientTrait, object: &Self) -> Result<Self, ControlPlaneError> {
        client.create_exporter(object).await
    }

    async fn update(client: &dyn ControlPlaneClientTrait, object: &Self) -> Result<Self, ControlPlaneError> {
        client.update_exporter(object).await
    }

    async fn delete(client: &dyn ControlPlaneClientTrait, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
        client.delete_exporter(namespace, name).await
    }
}

/// Reconcile target over the `K` objects of one instance
pub(crate) struct ObjectTarget<'a, K> {
    instance: &'a Instance,
    kind: PhantomData<fn() -> K>,
}

impl<'a, K: ManagedObject> ObjectTarget<'a, K> {
    pub(crate) fn new(instance: &'a Instance) -> Self {
        Self {
            instance,
            kind: PhantomData,
        }
    }

    /// Live object with the desired spec, labels and annotations applied
    fn merged(&self, live: &K, desired: &K) -> K {
        let mut updated = live.clone();
        updated.copy_desired(desired);
        self.instance
            .prepare_metadata(updated.meta_mut(), desired.meta().annotations.as_ref());
        updated
    }
}

#[async_trait::async_trait]
impl<K: ManagedObject> SyncTarget for ObjectTarget<'_, K> {
    type Desired = K;
    type Live = K;

    fn scope(&self) -> &str {
        self.instance.name()
    }

    fn kind(&self) -> &'static str {
        K::KIND
    }

    fn live_name(&self, live: &K) -> String {
        live.meta().name.clone().unwrap_or_default()
    }

    async fn list(&self) -> Result<Vec<K>, LabConfigError> {
        K::list(self.instance.client(), self.instance.namespace())
            .await
            .map_err(self.instance.error("list", K::KIND, "objects"))
    }

    fn diff(&self, live: &K, desired: &K) -> Result<Option<String>, LabConfigError> {
        let name = self.live_name(live);
        object_diff(K::KIND, &name, live, &self.merged(live, desired))
    }

    async fn create(&self, name: &str, desired: &K) -> Result<(), LabConfigError> {
        let mut object = desired.clone();
        self.instance
            .prepare_metadata(object.meta_mut(), desired.meta().annotations.as_ref());
        debug!(
            instance = %self.instance.name(),
            kind = K::KIND,
            name,
            namespace = object.meta().namespace.as_deref().unwrap_or_default(),
            "Creating object"
        );
        K::create(self.instance.client(), &object)
            .await
            .map_err(self.instance.error("create", K::KIND, name))?;
        Ok(())
    }

    async fn update(&self, name: &str, live: &K, desired: &K) -> Result<(), LabConfigError> {
        let namespace = self.instance.object_namespace(live.meta(), K::KIND)?;
        let mut backoff = ExponentialBackoff::conflict_retry();
        let mut latest = live.clone();

        for attempt in 1..=CONFLICT_RETRY_ATTEMPTS {
            let updated = self.merged(&latest, desired);
            match K::update(self.instance.client(), &updated).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_conflict() && attempt < CONFLICT_RETRY_ATTEMPTS => {
                    let delay = backoff.next_backoff();
                    warn!(
                        instance = %self.instance.name(),
                        kind = K::KIND,
                        name,
                        attempt,
                        max_attempts = CONFLICT_RETRY_ATTEMPTS,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Conflict updating object, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    latest = K::get(self.instance.client(), &namespace, name)
                        .await
                        .map_err(self.instance.error("fetch latest", K::KIND, name))?;
                }
                Err(err) if err.is_conflict() => break,
                Err(err) => return Err(self.instance.error("update", K::KIND, name)(err)),
            }
        }

        Err(LabConfigError::ConflictRetryExhausted {
            instance: self.instance.name().to_string(),
            kind: K::KIND,
            name: name.to_string(),
            attempts: CONFLICT_RETRY_ATTEMPTS,
        })
    }

    async fn delete(&self, name: &str, live: &K) -> Result<(), LabConfigError> {
        let namespace = self.instance.object_namespace(live.meta(), K::KIND)?;
        match K::delete(self.instance.client(), &namespace, name).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                warn!(
                    instance = %self.instance.name(),
                    kind = K::KIND,
                    name,
                    "Object already gone"
                );
                Ok(())
            }
            Err(err) => Err(self.instance.error("delete", K::KIND, name)(err)),
        }
    }
}
