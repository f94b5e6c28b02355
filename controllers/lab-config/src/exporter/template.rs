//! Exporter instance rendering
//!
//! An ExporterInstance is rendered first with the lab variables. Its
//! `configTemplateRef.parameters`, the control-plane namespace and endpoint and
//! the template's container image then become `$(params.x)` for the
//! referenced ExporterConfigTemplate, together with the exporter's issued
//! credentials (`$(params.token)`, `$(params.tls_ca)`).

use crate::config::LoadedLabConfig;
use crate::error::LabConfigError;
use crds::{ExporterConfigTemplate, ExporterInstance};
use std::collections::BTreeMap;
use templating::{ParameterSet, TemplateEngine};

/// Credentials issued by the control plane for one exporter
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceParameters {
    /// Exporter token from the credential Secret
    pub token: String,
    /// CA bundle for the control-plane endpoint, empty if none was issued
    pub tls_ca: String,
}

impl std::fmt::Debug for ServiceParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceParameters")
            .field("token", &"<redacted>")
            .field("tls_ca", &self.tls_ca)
            .finish()
    }
}

impl ServiceParameters {
    /// Token substituted when credentials are not fetched (dry run)
    pub const DRY_RUN_TOKEN: &'static str = "dry-run";

    /// Placeholder credentials for dry runs
    pub fn dry_run() -> Self {
        Self {
            token: Self::DRY_RUN_TOKEN.to_string(),
            tls_ca: String::new(),
        }
    }

    /// `token` and `tls_ca` as template parameters
    pub fn parameters(&self) -> ParameterSet {
        ParameterSet::from_map("service", [("token", self.token.as_str()), ("tls_ca", self.tls_ca.as_str())])
    }
}

/// Renders the config template of one exporter instance
#[derive(Debug)]
pub struct ExporterInstanceTemplater<'a> {
    config: &'a LoadedLabConfig,
    engine: TemplateEngine,
    exporter_instance: &'a ExporterInstance,
    config_template: &'a ExporterConfigTemplate,
    service_parameters: ServiceParameters,
}

impl<'a> ExporterInstanceTemplater<'a> {
    /// Look up the instance's config template
    pub fn new(config: &'a LoadedLabConfig, exporter_instance: &'a ExporterInstance) -> Result<Self, LabConfigError> {
        let template_name = &exporter_instance.spec.config_template_ref.name;
        let config_template =
            config
                .exporter_config_templates
                .get(template_name)
                .ok_or_else(|| LabConfigError::MissingReference {
                    kind: "exporter config template",
                    name: template_name.clone(),
                    referenced_by: format!("ExporterInstance {}", instance_name(exporter_instance)),
                })?;

        Ok(Self {
            config,
            engine: TemplateEngine::new(config.variables.clone(), None),
            exporter_instance,
            config_template,
            service_parameters: ServiceParameters::default(),
        })
    }

    /// Credentials exposed as `$(params.token)` and `$(params.tls_ca)`
    pub fn set_service_parameters(&mut self, service_parameters: ServiceParameters) {
        self.service_parameters = service_parameters;
    }

    /// Namespace and first endpoint of the instance's JumpstarterInstance
    pub fn namespace_and_endpoint(&self) -> Result<(String, String), LabConfigError> {
        let name = instance_name(self.exporter_instance);
        let reference = &self.exporter_instance.spec.jumpstarter_instance_ref.name;
        let jumpstarter_instance =
            self.config
                .jumpstarter_instances
                .get(reference)
                .ok_or_else(|| LabConfigError::MissingReference {
                    kind: "jumpstarter instance",
                    name: reference.clone(),
                    referenced_by: format!("ExporterInstance {name}"),
                })?;
        let endpoint = jumpstarter_instance.primary_endpoint().ok_or_else(|| {
            LabConfigError::InvalidConfig(format!(
                "in ExporterInstance {name}: jumpstarter instance {reference} has no endpoints"
            ))
        })?;
        Ok((
            jumpstarter_instance.spec.namespace.clone().unwrap_or_default(),
            endpoint.to_string(),
        ))
    }

    /// Rendered copies of the exporter instance and its config template
    pub fn render_templates(&self) -> Result<(ExporterInstance, ExporterConfigTemplate), LabConfigError> {
        let name = instance_name(self.exporter_instance);

        let mut instance = self.exporter_instance.clone();
        self.engine
            .apply(&mut instance)
            .map_err(LabConfigError::template(format!("ExporterInstance {name}")))?;

        let (namespace, endpoint) = self.namespace_and_endpoint()?;
        let mut parameters = ParameterSet::from_map(
            "exporter-instance",
            instance
                .spec
                .config_template_ref
                .parameters
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        parameters.set("namespace", namespace);
        parameters.set("endpoint", endpoint);
        parameters.set("container_image", self.config_template.spec.container_image.clone());

        let mut template = self.config_template.clone();
        self.engine
            .apply_with_parameters(&mut template, &parameters.merge(&self.service_parameters.parameters()))
            .map_err(LabConfigError::template(format!(
                "ExporterConfigTemplate {}",
                template.metadata.name.as_deref().unwrap_or_default()
            )))?;

        Ok((instance, template))
    }

    /// Exporter labels: the template's rendered labels overlaid by the instance labels
    pub fn render_template_labels(&self) -> Result<BTreeMap<String, String>, LabConfigError> {
        let (instance, template) = self.render_templates()?;
        let mut labels = template.spec.exporter_metadata.labels;
        labels.extend(instance.spec.labels);
        Ok(labels)
    }

    /// Rendered config template, ready to be written to the host
    pub fn render_template_config(&self) -> Result<ExporterConfigTemplate, LabConfigError> {
        self.render_templates().map(|(_, template)| template)
    }
}

fn instance_name(instance: &ExporterInstance) -> &str {
    instance.metadata.name.as_deref().unwrap_or_default()
}
