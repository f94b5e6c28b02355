//! Mock control-plane client for unit testing
//!
//! Objects live in memory keyed by `(namespace, name)`. The mock behaves like
//! the API server where the sync logic depends on it:
//! - create/update stamp a fresh `resourceVersion`;
//! - update with a stale `resourceVersion` fails with `Conflict`;
//! - exporters can be issued credentials (status + Secret) automatically.
//!
//! The mock is organized into resource-specific modules:
//! - `clients.rs` - Client operations
//! - `exporters.rs` - Exporter operations and credential issuance

mod clients;
mod exporters;

use crate::error::ControlPlaneError;
use crate::jumpstarter_trait::ControlPlaneClientTrait;
use crds::{Client, Exporter};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) type ObjectKey = (String, String);

pub(crate) fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock control-plane client for testing
#[derive(Clone, Default)]
pub struct MockControlPlaneClient {
    pub(crate) clients: Arc<Mutex<BTreeMap<ObjectKey, Client>>>,
    pub(crate) exporters: Arc<Mutex<BTreeMap<ObjectKey, Exporter>>>,
    pub(crate) secrets: Arc<Mutex<BTreeMap<ObjectKey, Secret>>>,
    // Counter for resourceVersion values
    pub(crate) next_version: Arc<Mutex<u64>>,
    // Updates that will fail with Conflict before succeeding
    pub(crate) pending_conflicts: Arc<Mutex<u32>>,
    // Issue exporter credentials after this many get_exporter calls
    pub(crate) credential_after_gets: Arc<Mutex<Option<u32>>>,
    pub(crate) exporter_gets: Arc<Mutex<HashMap<ObjectKey, u32>>>,
    // Log of mutating calls ("create client ns/name", ...)
    pub(crate) mutations: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for MockControlPlaneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockControlPlaneClient")
            .field("clients", &lock(&self.clients).len())
            .field("exporters", &lock(&self.exporters).len())
            .finish_non_exhaustive()
    }
}

impl MockControlPlaneClient {
    /// Create an empty mock
    pub fn new() -> Self {
        Self {
            next_version: Arc::new(Mutex::new(1)),
            ..Self::default()
        }
    }

    /// Add a client as if it already existed on the server (for test setup)
    pub fn add_client(&self, mut client: Client) {
        self.stamp(&mut client.metadata);
        let (ns, name) = meta_key(&client.metadata);
        lock(&self.clients).insert(key(&ns, &name), client);
    }

    /// Add an exporter as if it already existed on the server (for test setup)
    pub fn add_exporter(&self, mut exporter: Exporter) {
        self.stamp(&mut exporter.metadata);
        let (ns, name) = meta_key(&exporter.metadata);
        lock(&self.exporters).insert(key(&ns, &name), exporter);
    }

    /// Add a secret (for test setup)
    pub fn add_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect(),
            ),
            ..Secret::default()
        };
        lock(&self.secrets).insert(key(namespace, name), secret);
    }

    /// Make the next `count` updates fail with `Conflict`, each one bumping
    /// the stored `resourceVersion` as a concurrent writer would
    pub fn fail_next_updates_with_conflict(&self, count: u32) {
        *lock(&self.pending_conflicts) = count;
    }

    /// Issue exporter credentials once an exporter has been read `gets` times
    /// (`0` issues them on create)
    pub fn issue_credentials_after(&self, gets: u32) {
        *lock(&self.credential_after_gets) = Some(gets);
    }

    /// Mutating calls performed so far, in order
    pub fn mutations(&self) -> Vec<String> {
        lock(&self.mutations).clone()
    }

    /// Current stored client
    pub fn stored_client(&self, namespace: &str, name: &str) -> Option<Client> {
        lock(&self.clients).get(&key(namespace, name)).cloned()
    }

    /// Current stored exporter
    pub fn stored_exporter(&self, namespace: &str, name: &str) -> Option<Exporter> {
        lock(&self.exporters).get(&key(namespace, name)).cloned()
    }

    pub(crate) fn record(&self, mutation: String) {
        lock(&self.mutations).push(mutation);
    }

    /// Assign a new resourceVersion
    pub(crate) fn stamp(&self, meta: &mut ObjectMeta) {
        let mut version = lock(&self.next_version);
        *version = (*version).max(1);
        meta.resource_version = Some(version.to_string());
        meta.generation = Some(meta.generation.unwrap_or(0) + 1);
        *version += 1;
    }

    /// Consume one injected conflict, if any
    pub(crate) fn take_conflict(&self) -> bool {
        let mut pending = lock(&self.pending_conflicts);
        if *pending > 0 {
            *pending -= 1;
            true
        } else {
            false
        }
    }
}

pub(crate) fn meta_key(meta: &ObjectMeta) -> (String, String) {
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

pub(crate) fn require_namespace(meta: &ObjectMeta) -> Result<(String, String), ControlPlaneError> {
    let (ns, name) = meta_key(meta);
    if ns.is_empty() {
        return Err(ControlPlaneError::InvalidRequest(format!(
            "{name} has no metadata.namespace"
        )));
    }
    Ok((ns, name))
}

#[async_trait::async_trait]
impl ControlPlaneClientTrait for MockControlPlaneClient {
    async fn list_clients(&self, namespace: Option<&str>) -> Result<Vec<Client>, ControlPlaneError> {
        clients::list_clients(self, namespace).await
    }

    async fn get_client(&self, namespace: &str, name: &str) -> Result<Client, ControlPlaneError> {
        clients::get_client(self, namespace, name).await
    }

    async fn create_client(&self, client: &Client) -> Result<Client, ControlPlaneError> {
        clients::create_client(self, client).await
    }

    async fn update_client(&self, client: &Client) -> Result<Client, ControlPlaneError> {
        clients::update_client(self, client).await
    }

    async fn delete_client(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
        clients::delete_client(self, namespace, name).await
    }

    async fn list_exporters(&self, namespace: Option<&str>) -> Result<Vec<Exporter>, ControlPlaneError> {
        exporters::list_exporters(self, namespace).await
    }

    async fn get_exporter(&self, namespace: &str, name: &str) -> Result<Exporter, ControlPlaneError> {
        exporters::get_exporter(self, namespace, name).await
    }

    async fn create_exporter(&self, exporter: &Exporter) -> Result<Exporter, ControlPlaneError> {
        exporters::create_exporter(self, exporter).await
    }

    async fn update_exporter(&self, exporter: &Exporter) -> Result<Exporter, ControlPlaneError> {
        exporters::update_exporter(self, exporter).await
    }

    async fn delete_exporter(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
        exporters::delete_exporter(self, namespace, name).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ControlPlaneError> {
        lock(&self.secrets)
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(format!("Secret {namespace}/{name}")))
    }
}
