//! Kubernetes-backed control-plane client

use crate::error::ControlPlaneError;
use crate::jumpstarter_trait::ControlPlaneClientTrait;
use crds::{Client, Exporter};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Control-plane client over a `kube::Client`
#[derive(Clone)]
pub struct KubeControlPlaneClient {
    client: kube::Client,
}

impl std::fmt::Debug for KubeControlPlaneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeControlPlaneClient").finish_non_exhaustive()
    }
}

impl KubeControlPlaneClient {
    /// Wrap an existing kube client
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Build a client from a kube config (kubeconfig file, inline or in-cluster)
    pub fn try_from_config(config: kube::Config) -> Result<Self, ControlPlaneError> {
        Ok(Self::new(kube::Client::try_from(config)?))
    }

    fn api<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn list<K>(&self, namespace: Option<&str>) -> Result<Vec<K>, ControlPlaneError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let list = self.api::<K>(namespace).list(&ListParams::default()).await?;
        debug!(
            kind = %K::kind(&Default::default()),
            namespace = namespace.unwrap_or("<all>"),
            count = list.items.len(),
            "Listed objects"
        );
        Ok(list.items)
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<K, ControlPlaneError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>(Some(namespace))
            .get(name)
            .await
            .map_err(|e| ControlPlaneError::from_kube(e, "get", &K::kind(&Default::default()), namespace, name))
    }

    async fn create<K>(&self, object: &K) -> Result<K, ControlPlaneError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = object_key(object)?;
        self.api::<K>(Some(&namespace))
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| ControlPlaneError::from_kube(e, "create", &K::kind(&Default::default()), &namespace, &name))
    }

    async fn replace<K>(&self, object: &K) -> Result<K, ControlPlaneError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = object_key(object)?;
        self.api::<K>(Some(&namespace))
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| ControlPlaneError::from_kube(e, "update", &K::kind(&Default::default()), &namespace, &name))
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.api::<K>(Some(namespace))
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| ControlPlaneError::from_kube(e, "delete", &K::kind(&Default::default()), namespace, name))
    }
}

fn object_key<K: Resource>(object: &K) -> Result<(String, String), ControlPlaneError> {
    let name = object.name_any();
    let namespace = object.namespace().ok_or_else(|| {
        ControlPlaneError::InvalidRequest(format!("{name} has no metadata.namespace"))
    })?;
    Ok((namespace, name))
}

#[async_trait::async_trait]
impl ControlPlaneClientTrait for KubeControlPlaneClient {
    async fn list_clients(&self, namespace: Option<&str>) -> Result<Vec<Client>, ControlPlaneError> {
        self.list(namespace).await
    }

    async fn get_client(&self, namespace: &str, name: &str) -> Result<Client, ControlPlaneError> {
        self.get(namespace, name).await
    }

    async fn create_client(&self, client: &Client) -> Result<Client, ControlPlaneError> {
        self.create(client).await
    }

    async fn update_client(&self, client: &Client) -> Result<Client, ControlPlaneError> {
        self.replace(client).await
    }

    async fn delete_client(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
        self.delete::<Client>(namespace, name).await
    }

    async fn list_exporters(&self, namespace: Option<&str>) -> Result<Vec<Exporter>, ControlPlaneError> {
        self.list(namespace).await
    }

    async fn get_exporter(&self, namespace: &str, name: &str) -> Result<Exporter, ControlPlaneError> {
        self.get(namespace, name).await
    }

    async fn create_exporter(&self, exporter: &Exporter) -> Result<Exporter, ControlPlaneError> {
        self.create(exporter).await
    }

    async fn update_exporter(&self, exporter: &Exporter) -> Result<Exporter, ControlPlaneError> {
        self.replace(exporter).await
    }

    async fn delete_exporter(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
        self.delete::<Exporter>(namespace, name).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ControlPlaneError> {
        self.get(namespace, name).await
    }
}
