//! Config file and resource loading
//!
//! Each source category is decoded straight into its typed resource. A
//! document whose `apiVersion`/`kind` does not match the category is rejected,
//! as is a second document of the same kind with an already loaded name.

use super::{Config, LoadedLabConfig, SourceFiles};
use crate::error::LabConfigError;
use kube::Resource;
use lab_vars::VariableStore;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Load `jumpstarter-lab.yaml` and everything it references
///
/// The vault password comes from `vault_password_file`, then
/// `ANSIBLE_VAULT_PASSWORD_FILE`, then `ANSIBLE_VAULT_PASSWORD`.
pub fn load_config(path: &Path, vault_password_file: Option<&Path>) -> Result<LoadedLabConfig, LabConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| LabConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = serde_yaml::from_str(&content).map_err(|source| LabConfigError::Yaml {
        path: path.to_path_buf(),
        document: 0,
        source,
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let variables = VariableStore::from_env(vault_password_file)?;
    load_resources(&config, base_dir, variables)
}

/// Load all sources and variable files of `config`, resolving paths against `base_dir`
pub fn load_resources(
    config: &Config,
    base_dir: &Path,
    mut variables: VariableStore,
) -> Result<LoadedLabConfig, LabConfigError> {
    info!("Reading files from:");
    for pattern in config.sources.all_patterns() {
        info!("- {}", pattern);
    }

    let sources = &config.sources;
    let mut source_files = SourceFiles::new();
    let clients = load_kind(&sources.clients, base_dir, &mut source_files)?;
    let policies = load_kind(&sources.policies, base_dir, &mut source_files)?;
    let physical_locations = load_kind(&sources.locations, base_dir, &mut source_files)?;
    let exporter_hosts = load_kind(&sources.exporter_hosts, base_dir, &mut source_files)?;
    let exporter_instances = load_kind(&sources.exporters, base_dir, &mut source_files)?;
    let exporter_config_templates = load_kind(&sources.exporter_templates, base_dir, &mut source_files)?;
    let jumpstarter_instances = load_kind(&sources.jumpstarter_instances, base_dir, &mut source_files)?;

    for file in &config.variables {
        let path = base_dir.join(file);
        info!(path = %path.display(), "Loading variables");
        variables.load(&path)?;
    }

    Ok(LoadedLabConfig {
        clients,
        policies,
        physical_locations,
        exporter_hosts,
        exporter_instances,
        exporter_config_templates,
        jumpstarter_instances,
        variables: Arc::new(variables),
        source_files,
    })
}

/// Expand glob patterns relative to `base_dir`; empty patterns are skipped
fn expand_globs(patterns: &[String], base_dir: &Path) -> Result<Vec<PathBuf>, LabConfigError> {
    let mut paths = Vec::new();
    for pattern in patterns.iter().filter(|p| !p.is_empty()) {
        let absolute = base_dir.join(pattern);
        let absolute = absolute.to_string_lossy();
        let entries = glob::glob(&absolute).map_err(|source| LabConfigError::Glob {
            pattern: pattern.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry.map_err(|err| LabConfigError::Io {
                path: err.path().to_path_buf(),
                source: err.into_error(),
            })?;
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Split a file into its non-empty YAML documents
fn read_documents(path: &Path) -> Result<Vec<serde_yaml::Value>, LabConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| LabConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(&content).enumerate() {
        let value = serde_yaml::Value::deserialize(document).map_err(|source| LabConfigError::Yaml {
            path: path.to_path_buf(),
            document: index,
            source,
        })?;
        if !value.is_null() {
            documents.push(value);
        }
    }

    if documents.is_empty() {
        return Err(LabConfigError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    Ok(documents)
}

fn string_field<'a>(value: &'a serde_yaml::Value, key: &str) -> &'a str {
    value.get(key).and_then(serde_yaml::Value::as_str).unwrap_or("")
}

/// Load every document matched by `patterns` as `K`
fn load_kind<K>(
    patterns: &[String],
    base_dir: &Path,
    source_files: &mut SourceFiles,
) -> Result<BTreeMap<String, K>, LabConfigError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let kind = K::kind(&()).to_string();
    let api_version = K::api_version(&()).to_string();
    let mut loaded = BTreeMap::new();

    for path in expand_globs(patterns, base_dir)? {
        for (document, value) in read_documents(&path)?.into_iter().enumerate() {
            let found_kind = string_field(&value, "kind");
            let found_api_version = string_field(&value, "apiVersion");
            if found_kind != kind || found_api_version != api_version {
                return Err(LabConfigError::KindMismatch {
                    path,
                    document,
                    expected: format!("{api_version}/{kind}"),
                    found: format!("{found_api_version}/{found_kind}"),
                });
            }

            let object: K = serde_yaml::from_value(value).map_err(|source| LabConfigError::Yaml {
                path: path.clone(),
                document,
                source,
            })?;
            let name = match object.meta().name.as_deref() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    return Err(LabConfigError::MissingName {
                        path,
                        document,
                        kind,
                    });
                }
            };

            let files = source_files.entry(kind.clone()).or_default();
            if let Some(original) = files.get(&name) {
                return Err(LabConfigError::DuplicateName {
                    kind,
                    name,
                    path,
                    original: original.clone(),
                });
            }
            files.insert(name.clone(), path.clone());
            debug!(kind = %kind, name = %name, path = %path.display(), "Loaded resource");
            loaded.insert(name, object);
        }
    }
    Ok(loaded)
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
