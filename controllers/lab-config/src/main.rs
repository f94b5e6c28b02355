//! Jumpstarter Lab Config
//!
//! GitOps convergence for a Jumpstarter lab:
//! - Clients and Exporters on every Jumpstarter control plane
//! - Exporter config and systemd units on every exporter host (SSH/SFTP)
//!
//! The lab is described by `jumpstarter-lab.yaml` plus the resource and
//! variable files it lists; `apply` makes the lab match it.

mod apply;
mod backoff;
mod cli;
mod config;
mod diff;
mod error;
mod exporter;
mod instance;
mod reconcile;
#[cfg(test)]
mod test_utils;

use anyhow::{Context, Result};
use apply::KubeInstanceConnector;
use clap::Parser;
use cli::{ApplyArgs, Cli, Commands};
use host_client::SshConnector;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jumpstarter_lab_config=info".into()),
        )
        .init();

    // kube's rustls client needs a process-wide provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Apply(args) => {
            tokio::select! {
                result = run_apply(&args) => result,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, remaining changes were not applied");
                    anyhow::bail!("interrupted")
                }
            }
        }
    }
}

async fn run_apply(args: &ApplyArgs) -> Result<()> {
    let config = config::load_config(&args.config, args.vault_password_file.as_deref())
        .with_context(|| format!("failed to load lab config {}", args.config.display()))?;
    info!(
        config = %args.config.display(),
        instances = config.jumpstarter_instances.len(),
        hosts = config.exporter_hosts.len(),
        exporters = config.exporter_instances.len(),
        clients = config.clients.len(),
        "Loaded lab config"
    );

    let options = args.apply_options()?;
    let policy = args.host_key_policy();
    if args.insecure_ignore_host_keys {
        warn!("Exporter host keys are not verified (--insecure-ignore-host-keys)");
    }
    let hosts = Arc::new(SshConnector::new(policy));

    let report = apply::apply(&config, &options, &KubeInstanceConnector, hosts)
        .await
        .context("apply failed")?;
    report.log_summary();
    if !report.has_changes() {
        info!("Lab is up to date");
    }
    Ok(())
}
