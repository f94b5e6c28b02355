//! The `apply` run
//!
//! For every JumpstarterInstance (sorted by name): render it, connect, sync
//! Clients, then sync Exporters and collect their credentials. With the
//! credentials of every instance merged, push the rendered exporter files to
//! the exporter hosts.

use crate::config::LoadedLabConfig;
use crate::error::LabConfigError;
use crate::exporter::host::{ExporterHostSyncer, HostSyncOptions};
use crate::instance::Instance;
use crate::reconcile::{NameFilter, SyncOptions, SyncReport};
use async_trait::async_trait;
use crds::JumpstarterInstance;
use host_client::HostConnector;
use std::collections::BTreeMap;
use std::sync::Arc;
use templating::TemplateEngine;
use tracing::info;

/// Switches for one apply run
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Report changes without making them
    pub dry_run: bool,
    /// Delete unconfigured Clients and Exporters
    pub prune: bool,
    /// Log rendered exporter files (redacted)
    pub debug_configs: bool,
    /// Restricts which Clients are synced
    pub filter_clients: Option<NameFilter>,
    /// Restricts which Exporters and exporter hosts are synced
    pub filter_exporters: Option<NameFilter>,
}

impl ApplyOptions {
    fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            prune: self.prune,
        }
    }

    fn host_options(&self) -> HostSyncOptions {
        HostSyncOptions {
            dry_run: self.dry_run,
            debug_configs: self.debug_configs,
        }
    }
}

/// Opens an [`Instance`] for a rendered JumpstarterInstance
#[async_trait]
pub trait InstanceConnector: Send + Sync {
    /// Connect to the control plane of an already rendered instance
    async fn connect(&self, config: JumpstarterInstance, options: SyncOptions) -> Result<Instance, LabConfigError>;
}

/// Connects through the instance's kubeconfig
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeInstanceConnector;

#[async_trait]
impl InstanceConnector for KubeInstanceConnector {
    async fn connect(&self, config: JumpstarterInstance, options: SyncOptions) -> Result<Instance, LabConfigError> {
        Instance::connect(config, options).await
    }
}

/// What an apply run did (or would do, in dry-run mode)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Client sync per JumpstarterInstance
    pub clients: BTreeMap<String, SyncReport>,
    /// Exporters with collected credentials, per JumpstarterInstance
    pub exporters: BTreeMap<String, Vec<String>>,
    /// File sync per exporter instance
    pub hosts: BTreeMap<String, SyncReport>,
}

impl ApplyReport {
    /// Whether anything was (or would be) changed
    pub fn has_changes(&self) -> bool {
        self.clients.values().chain(self.hosts.values()).any(SyncReport::has_changes)
    }

    /// Log one line per sync
    pub fn log_summary(&self) {
        for (instance, report) in &self.clients {
            info!(
                instance = %instance,
                created = report.created.len(),
                updated = report.updated.len(),
                deleted = report.deleted.len(),
                "Clients"
            );
        }
        for (instance, exporters) in &self.exporters {
            info!(instance = %instance, exporters = exporters.len(), "Exporters");
        }
        for (exporter, report) in &self.hosts {
            info!(
                exporter = %exporter,
                created = report.created.len(),
                updated = report.updated.len(),
                deleted = report.deleted.len(),
                "Host files"
            );
        }
    }
}

/// Apply the lab configuration to every control plane and exporter host
pub async fn apply(
    config: &LoadedLabConfig,
    options: &ApplyOptions,
    instances: &dyn InstanceConnector,
    hosts: Arc<dyn HostConnector>,
) -> Result<ApplyReport, LabConfigError> {
    if options.dry_run {
        info!("Dry run: Would apply changes to:");
    } else {
        info!("Applying changes:");
    }

    let engine = TemplateEngine::new(Arc::clone(&config.variables), None);
    let mut report = ApplyReport::default();
    let mut service_parameters = BTreeMap::new();

    for (name, jumpstarter_instance) in &config.jumpstarter_instances {
        let mut rendered = jumpstarter_instance.clone();
        engine
            .apply(&mut rendered)
            .map_err(LabConfigError::template(format!("JumpstarterInstance {name}")))?;
        info!(instance = %name, endpoints = ?rendered.spec.endpoints, "Jumpstarter instance");

        let instance = instances.connect(rendered, options.sync_options()).await?;
        let clients = instance
            .sync_clients(config, options.filter_clients.as_ref())
            .await?;
        let exporters = instance
            .sync_exporters(config, options.filter_exporters.as_ref())
            .await?;

        report.clients.insert(name.clone(), clients);
        report
            .exporters
            .insert(name.clone(), exporters.keys().cloned().collect());
        service_parameters.extend(exporters);
    }

    report.hosts = ExporterHostSyncer::new(
        config,
        &engine,
        &service_parameters,
        options.host_options(),
        options.filter_exporters.as_ref(),
        hosts,
    )
    .sync_exporter_hosts()
    .await?;

    Ok(report)
}
