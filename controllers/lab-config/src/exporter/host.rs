//! Exporter host file sync
//!
//! Each exporter instance owns three files on its host, named after the
//! rendered `spec.exporterMetadata.name` (`<svc>`):
//!
//! - `/etc/containers/systemd/<svc>.container` (podman quadlet)
//! - `/etc/systemd/system/<svc>.service` (plain systemd unit)
//! - `/etc/jumpstarter/exporters/<svc>.yaml` (exporter config)
//!
//! Files with rendered content are written when they differ, files whose
//! template renders empty are removed. Any change triggers a daemon-reload
//! and a restart of `<svc>`.

use super::redact::redact;
use super::remote::RemoteHost;
use super::template::{ExporterInstanceTemplater, ServiceParameters};
use crate::config::LoadedLabConfig;
use crate::diff::unified_diff;
use crate::error::LabConfigError;
use crate::reconcile::{NameFilter, SyncOptions, SyncReport, SyncTarget, passes, reconcile};
use crds::{ExporterConfigTemplate, ExporterHost, ExporterInstance};
use host_client::HostConnector;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use templating::TemplateEngine;
use tracing::{debug, info};

/// Podman quadlet directory
pub const CONTAINER_UNIT_DIR: &str = "/etc/containers/systemd";
/// systemd unit directory
pub const SERVICE_UNIT_DIR: &str = "/etc/systemd/system";
/// Exporter config directory
pub const EXPORTER_CONFIG_DIR: &str = "/etc/jumpstarter/exporters";

/// Options for a host sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostSyncOptions {
    /// Report file changes without writing or running anything
    pub dry_run: bool,
    /// Log every rendered file
    pub debug_configs: bool,
}

/// Files managed for one exporter service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterFiles {
    /// systemd service name, `exporterMetadata.name` of the template
    pub service_name: String,
    /// Podman quadlet under [`CONTAINER_UNIT_DIR`]
    pub container_unit: PathBuf,
    /// Plain service unit under [`SERVICE_UNIT_DIR`]
    pub service_unit: PathBuf,
    /// Exporter config under [`EXPORTER_CONFIG_DIR`]
    pub config: PathBuf,
}

impl ExporterFiles {
    /// Paths for service `service_name`
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            container_unit: Path::new(CONTAINER_UNIT_DIR).join(format!("{service_name}.container")),
            service_unit: Path::new(SERVICE_UNIT_DIR).join(format!("{service_name}.service")),
            config: Path::new(EXPORTER_CONFIG_DIR).join(format!("{service_name}.yaml")),
        }
    }

    fn paths(&self) -> [&Path; 3] {
        [&self.container_unit, &self.service_unit, &self.config]
    }

    /// Path -> content for every file the template renders non-empty
    fn desired(&self, template: &ExporterConfigTemplate) -> BTreeMap<String, String> {
        let spec = &template.spec;
        [
            (&self.container_unit, &spec.systemd_container_template),
            (&self.service_unit, &spec.systemd_service_template),
            (&self.config, &spec.config_template),
        ]
        .into_iter()
        .filter(|(_, content)| !content.is_empty())
        .map(|(path, content)| (path.display().to_string(), content.clone()))
        .collect()
    }
}

/// A managed file present on the host
#[derive(Debug, Clone)]
struct HostFile {
    path: PathBuf,
    content: String,
}

/// The managed files of one exporter service, as a reconcile target
struct HostFiles<'a> {
    host: &'a RemoteHost,
    scope: String,
    files: &'a ExporterFiles,
}

#[async_trait::async_trait]
impl<'a> SyncTarget for HostFiles<'a> {
    type Desired = String;
    type Live = HostFile;

    fn scope(&self) -> &str {
        &self.scope
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    fn live_name(&self, live: &HostFile) -> String {
        live.path.display().to_string()
    }

    async fn list(&self) -> Result<Vec<HostFile>, LabConfigError> {
        let mut present = Vec::new();
        for path in self.files.paths() {
            if let Some(content) = self.host.read_file(path).await? {
                present.push(HostFile {
                    path: path.to_path_buf(),
                    content,
                });
            }
        }
        Ok(present)
    }

    fn diff(&self, live: &HostFile, desired: &String) -> Result<Option<String>, LabConfigError> {
        if live.content == *desired {
            return Ok(None);
        }
        Ok(Some(redact(&unified_diff(&live.content, desired, "existing", "new"))))
    }

    async fn create(&self, name: &str, desired: &String) -> Result<(), LabConfigError> {
        self.host.write_file(Path::new(name), desired, true).await
    }

    async fn update(&self, name: &str, _live: &HostFile, desired: &String) -> Result<(), LabConfigError> {
        self.host.write_file(Path::new(name), desired, false).await
    }

    async fn delete(&self, _name: &str, live: &HostFile) -> Result<(), LabConfigError> {
        self.host.remove_file(&live.path).await
    }
}

/// Pushes rendered exporter files to every exporter host
pub struct ExporterHostSyncer<'a> {
    config: &'a LoadedLabConfig,
    engine: &'a TemplateEngine,
    service_parameters: &'a BTreeMap<String, ServiceParameters>,
    options: HostSyncOptions,
    filter: Option<&'a NameFilter>,
    connector: Arc<dyn HostConnector>,
}

impl std::fmt::Debug for ExporterHostSyncer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterHostSyncer")
            .field("options", &self.options)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl<'a> ExporterHostSyncer<'a> {
    /// Create a syncer
    ///
    /// `service_parameters` must hold credentials for every exporter
    /// instance passing `filter` that has a config template.
    pub fn new(
        config: &'a LoadedLabConfig,
        engine: &'a TemplateEngine,
        service_parameters: &'a BTreeMap<String, ServiceParameters>,
        options: HostSyncOptions,
        filter: Option<&'a NameFilter>,
        connector: Arc<dyn HostConnector>,
    ) -> Self {
        Self {
            config,
            engine,
            service_parameters,
            options,
            filter,
            connector,
        }
    }

    /// Sync every host that has at least one exporter instance passing the filter
    ///
    /// Returns the file report per exporter instance name.
    pub async fn sync_exporter_hosts(&self) -> Result<BTreeMap<String, SyncReport>, LabConfigError> {
        let mut reports = BTreeMap::new();
        for (name, host) in &self.config.exporter_hosts {
            let instances: Vec<&ExporterInstance> = self
                .config
                .exporter_instances_for_host(name)
                .into_iter()
                .filter(|instance| passes(self.filter, instance_name(instance)))
                .collect();
            if instances.is_empty() {
                debug!(host = %name, "No exporter instances, skipping host");
                continue;
            }
            reports.extend(self.sync_host(host, &instances).await?);
        }
        Ok(reports)
    }

    async fn sync_host(
        &self,
        host: &ExporterHost,
        instances: &[&ExporterInstance],
    ) -> Result<BTreeMap<String, SyncReport>, LabConfigError> {
        let name = host.metadata.name.as_deref().unwrap_or_default();
        let mut rendered = host.clone();
        self.engine
            .apply(&mut rendered)
            .map_err(LabConfigError::template(format!("ExporterHost {name}")))?;

        let address = rendered
            .spec
            .addresses
            .first()
            .unwrap_or(&rendered.spec.management.ssh.host);
        info!(host = name, address = %address, "Exporter host");

        let remote = RemoteHost::connect(Arc::clone(&self.connector), &rendered).await?;
        // Connection status check, no files are touched when it fails
        remote.run_checked("ls -la").await?;
        info!(host = name, "Connection: ok");

        let mut reports = BTreeMap::new();
        for instance in instances {
            let exporter = instance_name(instance);
            if !instance.has_config_template() {
                debug!(host = name, exporter, "No config template, nothing to deploy");
                continue;
            }
            info!(host = name, exporter, "Exporter instance");

            let mut templater = ExporterInstanceTemplater::new(self.config, instance)?;
            let parameters = self
                .service_parameters
                .get(exporter)
                .cloned()
                .ok_or_else(|| LabConfigError::MissingServiceParameters(exporter.to_string()))?;
            templater.set_service_parameters(parameters);
            let template = templater.render_template_config()?;

            if self.options.debug_configs {
                log_rendered(exporter, &template);
            }
            reports.insert(exporter.to_string(), self.apply(&remote, &template).await?);
        }
        Ok(reports)
    }

    /// Converge the files of one rendered config template and restart its service on change
    async fn apply(&self, host: &RemoteHost, template: &ExporterConfigTemplate) -> Result<SyncReport, LabConfigError> {
        let template_name = template.metadata.name.clone().unwrap_or_default();
        let spec = &template.spec;
        if !spec.systemd_container_template.is_empty() && !spec.systemd_service_template.is_empty() {
            return Err(LabConfigError::BothServiceTemplates {
                template: template_name,
            });
        }
        let service = spec.exporter_metadata.name.as_str();
        if service.is_empty() {
            return Err(LabConfigError::InvalidConfig(format!(
                "exporter config template {template_name} renders an empty exporterMetadata.name"
            )));
        }

        let files = ExporterFiles::new(service);
        let desired = files.desired(template);
        let target = HostFiles {
            host,
            scope: format!("{}/{service}", host.name()),
            files: &files,
        };
        let options = SyncOptions {
            dry_run: self.options.dry_run,
            prune: true,
        };
        let report = reconcile(&target, &desired, None, options).await?;

        if !report.has_changes() {
            info!(host = host.name(), service, "No changes needed");
            return Ok(report);
        }
        if self.options.dry_run {
            info!(host = host.name(), service, "dry run: Would restart exporter service");
            return Ok(report);
        }

        let service_unit = files.service_unit.display().to_string();
        host.run_checked("systemctl daemon-reload").await?;
        // A pruned service unit has nothing left to enable
        if report.changed(&service_unit) && desired.contains_key(&service_unit) {
            host.run_checked(&format!("systemctl enable {service}")).await?;
        }
        host.run_checked(&format!("systemctl restart {service}")).await?;
        info!(host = host.name(), service, "Exporter service started");
        Ok(report)
    }
}

fn log_rendered(instance: &str, template: &ExporterConfigTemplate) {
    let spec = &template.spec;
    for (label, content) in [
        ("exporter config", &spec.config_template),
        ("systemd container unit", &spec.systemd_container_template),
        ("systemd service unit", &spec.systemd_service_template),
    ] {
        if !content.is_empty() {
            info!(exporter = instance, "Rendered {label}:\n{}", redact(content));
        }
    }
}

fn instance_name(instance: &ExporterInstance) -> &str {
    instance.metadata.name.as_deref().unwrap_or_default()
}

#[cfg(test)]
#[path = "host_test.rs"]
mod tests;
