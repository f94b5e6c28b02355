//! Exporter operations for MockControlPlaneClient
//!
//! Credential issuance mimics the Jumpstarter controller: it sets
//! `status.credential` to `<name>-exporter` and creates that Secret with a
//! `token` key of `token-<name>`.

use super::{MockControlPlaneClient, key, lock, require_namespace};
use crate::error::ControlPlaneError;
use crds::{Exporter, ExporterStatus, LocalReference};

pub async fn list_exporters(client: &MockControlPlaneClient, namespace: Option<&str>) -> Result<Vec<Exporter>, ControlPlaneError> {
    Ok(lock(&client.exporters)
        .iter()
        .filter(|((ns, _), _)| namespace.is_none_or(|wanted| ns == wanted))
        .map(|(_, e)| e.clone())
        .collect())
}

pub async fn get_exporter(client: &MockControlPlaneClient, namespace: &str, name: &str) -> Result<Exporter, ControlPlaneError> {
    let gets = {
        let mut counts = lock(&client.exporter_gets);
        let count = counts.entry(key(namespace, name)).or_insert(0);
        *count += 1;
        *count
    };
    let threshold = *lock(&client.credential_after_gets);
    if threshold.is_some_and(|after| gets >= after) {
        issue_credential(client, namespace, name);
    }

    lock(&client.exporters)
        .get(&key(namespace, name))
        .cloned()
        .ok_or_else(|| ControlPlaneError::NotFound(format!("Exporter {namespace}/{name}")))
}

pub async fn create_exporter(client: &MockControlPlaneClient, object: &Exporter) -> Result<Exporter, ControlPlaneError> {
    let (ns, name) = require_namespace(&object.metadata)?;
    let mut created = object.clone();
    {
        let mut store = lock(&client.exporters);
        if store.contains_key(&key(&ns, &name)) {
            return Err(ControlPlaneError::AlreadyExists(format!("Exporter {ns}/{name}")));
        }
        created.metadata.generation = None;
        created.status = None;
        client.stamp(&mut created.metadata);
        store.insert(key(&ns, &name), created.clone());
    }
    client.record(format!("create exporter {ns}/{name}"));

    if *lock(&client.credential_after_gets) == Some(0) {
        issue_credential(client, &ns, &name);
    }
    Ok(created)
}

pub async fn update_exporter(client: &MockControlPlaneClient, object: &Exporter) -> Result<Exporter, ControlPlaneError> {
    let (ns, name) = require_namespace(&object.metadata)?;
    let mut store = lock(&client.exporters);
    let stored = store
        .get_mut(&key(&ns, &name))
        .ok_or_else(|| ControlPlaneError::NotFound(format!("Exporter {ns}/{name}")))?;

    if client.take_conflict() {
        client.stamp(&mut stored.metadata);
        return Err(ControlPlaneError::Conflict(format!("update Exporter {ns}/{name}: injected")));
    }
    if object.metadata.resource_version != stored.metadata.resource_version {
        return Err(ControlPlaneError::Conflict(format!(
            "update Exporter {ns}/{name}: stale resourceVersion"
        )));
    }

    let mut updated = object.clone();
    updated.status = stored.status.clone();
    updated.metadata.generation = stored.metadata.generation;
    client.stamp(&mut updated.metadata);
    *stored = updated.clone();
    client.record(format!("update exporter {ns}/{name}"));
    Ok(updated)
}

pub async fn delete_exporter(client: &MockControlPlaneClient, namespace: &str, name: &str) -> Result<(), ControlPlaneError> {
    lock(&client.exporters)
        .remove(&key(namespace, name))
        .ok_or_else(|| ControlPlaneError::NotFound(format!("Exporter {namespace}/{name}")))?;
    client.record(format!("delete exporter {namespace}/{name}"));
    Ok(())
}

fn issue_credential(client: &MockControlPlaneClient, namespace: &str, name: &str) {
    let secret_name = format!("{name}-exporter");
    {
        let mut store = lock(&client.exporters);
        let Some(exporter) = store.get_mut(&key(namespace, name)) else {
            return;
        };
        let status = exporter.status.get_or_insert_with(ExporterStatus::default);
        if status.credential.is_some() {
            return;
        }
        status.credential = Some(LocalReference::new(secret_name.clone()));
    }
    let token = format!("token-{name}");
    client.add_secret(namespace, &secret_name, &[("token", token.as_str())]);
}
