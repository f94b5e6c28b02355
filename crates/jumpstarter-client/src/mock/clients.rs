//! Client operations for MockControlPlaneClient

use super::{MockControlPlaneClient, key, lock, require_namespace};
use crate::error::ControlPlaneError;
use crds::Client;

pub async fn list_clients(client: &MockControlPlaneClient, namespace: Option<&str>) -> Result<Vec<Client>, ControlPlaneError> {
    Ok(lock(&client.clients)
        .iter()
        .filter(|((ns, _), _)| namespace.is_none_or(|wanted| ns == wanted))
        .map(|(_, c)| c.clone())
        .collect())
}

pub async fn get_client(client: &MockControlPlaneClient, namespace: &str, name: &str) -> Result<Client, ControlPlaneError> {
    lock(&client.clients)
        .get(&key(namespace, name))
        .cloned()
        .ok_or_else(|| ControlPlaneError::NotFound(format!("Client {namespace}/{name}")))
}

pub async fn create_client(client: &MockControlPlaneClient, object: &Client) -> Result<Client, ControlPlaneError> {
    let (ns, name) = require_namespace(&object.metadata)?;
    let mut store = lock(&client.clients);
    if store.contains_key(&key(&ns, &name)) {
        return Err(ControlPlaneError::AlreadyExists(format!("Client {ns}/{name}")));
    }
    let mut created = object.clone();
    created.metadata.generation = None;
    created.status = None;
    client.stamp(&mut created.metadata);
    store.insert(key(&ns, &name), created.clone());
    client.record(format!("create client {ns}/{name}"));
    Ok(created)
}

pub async fn update_client(client: &MockControlPlaneClient, object: &Client) -> Result<Client, ControlPlaneError> {
    let (ns, name) = require_namespace(&object.metadata)?;
    let mut store = lock(&client.clients);
    let stored = store
        .get_mut(&key(&ns, &name))
        .ok_or_else(|| ControlPlaneError::NotFound(format!("Client {ns}/{name}")))?;

    if client.take_conflict() {
        client.stamp(&mut stored.metadata);
        return Err(ControlPlaneError::Conflict(format!("update Client {ns}/{name}: injected")));
    }
    if object.metadata.resource_version != stored.metadata.resource_version {
        return Err(ControlPlaneError::Conflict(format!(
            "update Client {ns}/{name}: stale resourceVersion"
        )));
    }

    let mut updated = object.clone();
    updated.status = stored.status.clone();
    updated.metadata.generation = stored.metadata.generation;
    client.stamp(&mut updated.metadata);
    *stored = updated.clone();
    client.record(format!("update client {ns}/{name}"));
    Ok(updated)
}

pub async fn delete_client(client: &MockControlPlaneClient, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
    lock(&client.clients)
        .remove(&key(namespace, name))
        .ok_or_else(|| ControlPlaneError::NotFound(format!("Client {namespace}/{name}")))?;
    client.record(format!("delete client {namespace}/{name}"));
    Ok(())
}
