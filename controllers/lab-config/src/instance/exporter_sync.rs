//! Exporter sync and credential collection

use super::Instance;
use super::object::ObjectTarget;
use crate::backoff::{CREDENTIAL_WAIT_ATTEMPTS, ExponentialBackoff};
use crate::config::LoadedLabConfig;
use crate::error::LabConfigError;
use crate::exporter::template::{ExporterInstanceTemplater, ServiceParameters};
use crate::reconcile::{NameFilter, passes, reconcile};
use crds::{Exporter, ExporterInstance, ExporterSpec};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Secret key holding the exporter token
const TOKEN_KEY: &str = "token";
/// Secret key holding the control-plane CA bundle
const CA_KEY: &str = "ca.crt";

impl Instance {
    /// Reconcile the control plane's Exporters against the exporter instances
    /// referencing this instance, then collect each exporter's credentials
    ///
    /// Returns exporter name -> credentials for every desired exporter that
    /// passes `filter`. In dry-run mode no credentials are fetched and every
    /// exporter gets [`ServiceParameters::dry_run`].
    pub async fn sync_exporters(
        &self,
        config: &LoadedLabConfig,
        filter: Option<&NameFilter>,
    ) -> Result<BTreeMap<String, ServiceParameters>, LabConfigError> {
        info!(instance = %self.name(), "Syncing exporters");
        let desired = self.desired_exporters(config)?;
        let target = ObjectTarget::<Exporter>::new(self);
        reconcile(&target, &desired, filter, self.options()).await?;

        let mut service_parameters = BTreeMap::new();
        for (name, exporter) in desired.iter().filter(|(name, _)| passes(filter, name)) {
            let parameters = if self.options().dry_run {
                ServiceParameters::dry_run()
            } else {
                let namespace = self.object_namespace(&exporter.metadata, "exporter")?;
                self.wait_exporter_credentials(&namespace, name).await?
            };
            service_parameters.insert(name.clone(), parameters);
        }
        Ok(service_parameters)
    }

    /// Desired Exporters for the exporter instances bound to this instance
    pub fn desired_exporters(&self, config: &LoadedLabConfig) -> Result<BTreeMap<String, Exporter>, LabConfigError> {
        let mut desired = BTreeMap::new();
        for (name, exporter_instance) in &config.exporter_instances {
            if exporter_instance.spec.jumpstarter_instance_ref.name != self.name() {
                continue;
            }
            desired.insert(name.clone(), exporter_for_instance(config, exporter_instance)?);
        }
        debug!(instance = %self.name(), count = desired.len(), "Desired exporters");
        Ok(desired)
    }

    /// Poll until the control plane has issued credentials for `name`
    pub(crate) async fn wait_exporter_credentials(&self, namespace: &str, name: &str) -> Result<ServiceParameters, LabConfigError> {
        let mut backoff = ExponentialBackoff::credential_wait();
        let mut last_error = String::from("credential not issued yet");

        for attempt in 1..=CREDENTIAL_WAIT_ATTEMPTS {
            match self.exporter_credentials(namespace, name).await {
                Ok(Some(parameters)) => return Ok(parameters),
                Ok(None) => last_error = String::from("credential not issued yet"),
                Err(err) => last_error = err.to_string(),
            }
            info!(
                instance = %self.name(),
                exporter = name,
                namespace,
                attempt,
                max_attempts = CREDENTIAL_WAIT_ATTEMPTS,
                "Waiting for exporter credentials"
            );
            if attempt < CREDENTIAL_WAIT_ATTEMPTS {
                tokio::time::sleep(backoff.next_backoff()).await;
            }
        }

        Err(LabConfigError::CredentialTimeout {
            instance: self.name().to_string(),
            name: name.to_string(),
            attempts: CREDENTIAL_WAIT_ATTEMPTS,
            last_error,
        })
    }

    /// Credentials of an exporter, `None` while the status has no credential
    pub(crate) async fn exporter_credentials(&self, namespace: &str, name: &str) -> Result<Option<ServiceParameters>, LabConfigError> {
        let exporter = self
            .client()
            .get_exporter(namespace, name)
            .await
            .map_err(self.error("get", "exporter", name))?;
        let Some(credential) = exporter
            .status
            .and_then(|status| status.credential)
            .filter(|credential| credential.is_set())
        else {
            return Ok(None);
        };

        let secret = self
            .client()
            .get_secret(namespace, &credential.name)
            .await
            .map_err(self.error("get", "secret", &credential.name))?;
        let data = secret.data.unwrap_or_default();
        let token = data.get(TOKEN_KEY).ok_or_else(|| LabConfigError::MissingToken {
            secret: credential.name.clone(),
        })?;

        Ok(Some(ServiceParameters {
            token: String::from_utf8_lossy(&token.0).into_owned(),
            tls_ca: data
                .get(CA_KEY)
                .map(|ca| String::from_utf8_lossy(&ca.0).into_owned())
                .unwrap_or_default(),
        }))
    }
}

/// Build the Exporter an exporter instance maps to
///
/// Labels come from the instance, or from the referenced config template's
/// rendered labels overlaid by the instance labels.
pub fn exporter_for_instance(config: &LoadedLabConfig, instance: &ExporterInstance) -> Result<Exporter, LabConfigError> {
    let labels = if instance.has_config_template() {
        ExporterInstanceTemplater::new(config, instance)?.render_template_labels()?
    } else {
        instance.spec.labels.clone()
    };

    let mut exporter = Exporter::new(
        instance.metadata.name.as_deref().unwrap_or_default(),
        ExporterSpec {
            username: instance.spec.username.clone(),
        },
    );
    exporter.metadata.namespace = instance.metadata.namespace.clone();
    exporter.metadata.annotations = instance.metadata.annotations.clone();
    exporter.metadata.labels = (!labels.is_empty()).then_some(labels);
    Ok(exporter)
}
