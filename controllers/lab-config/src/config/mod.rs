//! Lab configuration
//!
//! `jumpstarter-lab.yaml` lists glob patterns per resource category and the
//! variable files to load:
//!
//! ```yaml
//! sources:
//!   locations: [locations/*.yaml]
//!   clients: [clients/*.yaml]
//!   policies: [policies/*.yaml]
//!   exporter_hosts: [hosts/*.yaml]
//!   exporters: [exporters/**/*.yaml]
//!   exporter_templates: [templates/*.yaml]
//!   jumpstarter_instances: [instances/*.yaml]
//! variables:
//!   - vars/common.yaml
//!   - vars/vault.yaml
//! ```
//!
//! Paths are relative to the directory containing the config file.

mod loader;

pub use loader::{load_config, load_resources};

use crds::{
    Client, ExporterAccessPolicy, ExporterConfigTemplate, ExporterHost, ExporterInstance, JumpstarterInstance,
    PhysicalLocation,
};
use lab_vars::VariableStore;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "jumpstarter-lab.yaml";

/// Parsed `jumpstarter-lab.yaml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub sources: Sources,
    /// Variable files, loaded in order
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Glob patterns per resource category
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Sources {
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub clients: Vec<String>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub exporter_hosts: Vec<String>,
    #[serde(default)]
    pub exporters: Vec<String>,
    #[serde(default)]
    pub exporter_templates: Vec<String>,
    #[serde(default)]
    pub jumpstarter_instances: Vec<String>,
}

impl Sources {
    /// Every pattern across all categories, in load order
    pub fn all_patterns(&self) -> impl Iterator<Item = &str> {
        [
            &self.clients,
            &self.policies,
            &self.locations,
            &self.exporter_hosts,
            &self.exporters,
            &self.exporter_templates,
            &self.jumpstarter_instances,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
    }
}

/// File each resource was loaded from: kind -> name -> path
pub type SourceFiles = BTreeMap<String, BTreeMap<String, PathBuf>>;

/// All resources of a lab configuration, keyed by `metadata.name`
#[derive(Debug, Clone)]
pub struct LoadedLabConfig {
    pub clients: BTreeMap<String, Client>,
    pub policies: BTreeMap<String, ExporterAccessPolicy>,
    pub physical_locations: BTreeMap<String, PhysicalLocation>,
    pub exporter_hosts: BTreeMap<String, ExporterHost>,
    pub exporter_instances: BTreeMap<String, ExporterInstance>,
    pub exporter_config_templates: BTreeMap<String, ExporterConfigTemplate>,
    pub jumpstarter_instances: BTreeMap<String, JumpstarterInstance>,
    pub variables: Arc<VariableStore>,
    pub source_files: SourceFiles,
}

impl LoadedLabConfig {
    /// Empty configuration backed by `variables`
    pub fn new(variables: Arc<VariableStore>) -> Self {
        Self {
            clients: BTreeMap::new(),
            policies: BTreeMap::new(),
            physical_locations: BTreeMap::new(),
            exporter_hosts: BTreeMap::new(),
            exporter_instances: BTreeMap::new(),
            exporter_config_templates: BTreeMap::new(),
            jumpstarter_instances: BTreeMap::new(),
            variables,
            source_files: SourceFiles::new(),
        }
    }

    /// Exporter instances whose `exporterHostRef` names `host`, sorted by name
    pub fn exporter_instances_for_host(&self, host: &str) -> Vec<&ExporterInstance> {
        self.exporter_instances
            .values()
            .filter(|instance| instance.spec.exporter_host_ref.name == host)
            .collect()
    }

    /// File a resource was loaded from
    pub fn source_file(&self, kind: &str, name: &str) -> Option<&Path> {
        self.source_files
            .get(kind)
            .and_then(|names| names.get(name))
            .map(PathBuf::as_path)
    }
}
