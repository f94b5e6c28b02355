//! CLI argument parsing using clap derive

use crate::apply::ApplyOptions;
use crate::config::DEFAULT_CONFIG_FILE;
use crate::error::LabConfigError;
use crate::reconcile::NameFilter;
use clap::{Args, Parser, Subcommand};
use host_client::HostKeyPolicy;
use std::path::PathBuf;

/// Jumpstarter lab config - converge control planes and exporter hosts with a Git-managed lab definition
#[derive(Parser, Debug)]
#[command(name = "jumpstarter-lab-config")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Apply the lab configuration to every Jumpstarter instance and exporter host
    Apply(ApplyArgs),
}

/// Arguments of `apply`
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ApplyArgs {
    /// Lab configuration file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Show what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Delete Clients, Exporters and host files that are no longer configured
    #[arg(long)]
    pub prune: bool,

    /// File holding the Ansible vault password
    /// (default: $ANSIBLE_VAULT_PASSWORD_FILE, then $ANSIBLE_VAULT_PASSWORD)
    #[arg(long, value_name = "PATH")]
    pub vault_password_file: Option<PathBuf>,

    /// Log the rendered exporter config and unit files
    #[arg(long)]
    pub debug_configs: bool,

    /// Only sync Clients whose name matches this regular expression
    #[arg(long, value_name = "REGEX")]
    pub filter_clients: Option<String>,

    /// Only sync Exporters whose name matches this regular expression
    #[arg(long, value_name = "REGEX")]
    pub filter_exporters: Option<String>,

    /// known_hosts file for exporter host keys (default: ~/.ssh/known_hosts)
    #[arg(long, value_name = "PATH", conflicts_with = "insecure_ignore_host_keys")]
    pub known_hosts: Option<PathBuf>,

    /// Accept any exporter host key
    #[arg(long)]
    pub insecure_ignore_host_keys: bool,
}

impl ApplyArgs {
    /// Host key verification selected by the flags
    pub fn host_key_policy(&self) -> HostKeyPolicy {
        if self.insecure_ignore_host_keys {
            return HostKeyPolicy::AcceptAny;
        }
        match &self.known_hosts {
            Some(path) => HostKeyPolicy::KnownHosts {
                path: path.clone(),
                trust_on_first_use: true,
            },
            None => HostKeyPolicy::default_known_hosts(),
        }
    }

    /// Run options, with the name filters compiled
    pub fn apply_options(&self) -> Result<ApplyOptions, LabConfigError> {
        Ok(ApplyOptions {
            dry_run: self.dry_run,
            prune: self.prune,
            debug_configs: self.debug_configs,
            filter_clients: NameFilter::optional("client", self.filter_clients.as_deref())?,
            filter_exporters: NameFilter::optional("exporter", self.filter_exporters.as_deref())?,
        })
    }
}
