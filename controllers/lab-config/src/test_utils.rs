//! Test utilities for unit testing the sync modules
//!
//! Fixtures describe a small lab: one control plane (`prod`), one host
//! (`rpi-01`) and one exporter instance (`dut-01`) rendered from the
//! `rcar-template` config template.

#[cfg(test)]
use crate::config::LoadedLabConfig;
#[cfg(test)]
use crds::*;
#[cfg(test)]
use lab_vars::VariableStore;
#[cfg(test)]
use std::collections::BTreeMap;
#[cfg(test)]
use std::sync::Arc;

/// Variables referenced by the fixtures
#[cfg(test)]
pub fn lab_variables() -> VariableStore {
    let mut variables = VariableStore::new(None);
    variables.insert("domain", "lab.example.com").unwrap();
    variables.insert("ssh_password", "hunter2").unwrap();
    variables
}

/// JumpstarterInstance `name` serving `namespace`
#[cfg(test)]
pub fn jumpstarter_instance(name: &str, namespace: &str) -> JumpstarterInstance {
    JumpstarterInstance::new(
        name,
        JumpstarterInstanceSpec {
            endpoints: vec!["grpc.$(vars.domain):443".to_string()],
            namespace: Some(namespace.to_string()),
            ..JumpstarterInstanceSpec::default()
        },
    )
}

/// ExporterHost reachable at `<name>.$(vars.domain)`
#[cfg(test)]
pub fn exporter_host(name: &str) -> ExporterHost {
    let mut spec = ExporterHostSpec {
        addresses: vec![format!("{name}.$(vars.domain)")],
        ..ExporterHostSpec::default()
    };
    spec.management.ssh.host = format!("{name}.$(vars.domain)");
    spec.management.ssh.user = "root".to_string();
    spec.management.ssh.password = Some("$(vars.ssh_password)".to_string());
    ExporterHost::new(name, spec)
}

/// ExporterInstance on `host`, registered with `jumpstarter`, using `rcar-template`
#[cfg(test)]
pub fn exporter_instance(name: &str, host: &str, jumpstarter: &str) -> ExporterInstance {
    ExporterInstance::new(
        name,
        ExporterInstanceSpec {
            username: Some(format!("lab:{name}")),
            exporter_host_ref: LocalReference::new(host),
            jumpstarter_instance_ref: LocalReference::new(jumpstarter),
            config_template_ref: ConfigTemplateRef {
                name: "rcar-template".to_string(),
                parameters: BTreeMap::from([
                    ("board".to_string(), "rcar-s4".to_string()),
                    ("dut".to_string(), "$(name)".to_string()),
                ]),
            },
            labels: BTreeMap::from([
                ("location".to_string(), "lab-a".to_string()),
                ("team".to_string(), "platform".to_string()),
            ]),
            ..ExporterInstanceSpec::default()
        },
    )
}

/// Config template rendering a container unit and an exporter config
#[cfg(test)]
pub fn config_template(name: &str) -> ExporterConfigTemplate {
    ExporterConfigTemplate::new(
        name,
        ExporterConfigTemplateSpec {
            container_image: "quay.io/jumpstarter-dev/jumpstarter:latest".to_string(),
            exporter_metadata: ExporterMeta {
                name: "exporter-$(params.dut)".to_string(),
                labels: BTreeMap::from([
                    ("board".to_string(), "$(params.board)".to_string()),
                    ("location".to_string(), "lab-b".to_string()),
                ]),
            },
            config_template: concat!(
                "endpoint: $(params.endpoint)\n",
                "token: $(params.token)\n",
                "namespace: $(params.namespace)\n",
                "labels:\n",
                "  board: $(params.board)\n",
            )
            .to_string(),
            systemd_container_template: concat!(
                "[Container]\n",
                "Image=$(params.container_image)\n",
                "Volume=/etc/jumpstarter:/etc/jumpstarter\n",
            )
            .to_string(),
            systemd_service_template: String::new(),
        },
    )
}

/// Client `name` with an SSO username
#[cfg(test)]
pub fn client(name: &str) -> Client {
    Client::new(
        name,
        ClientSpec {
            username: Some(format!("sso:{name}")),
        },
    )
}

/// The fixture lab: `prod` / `rpi-01` / `dut-01` plus client `alice`
#[cfg(test)]
pub fn lab_config(variables: VariableStore) -> LoadedLabConfig {
    let mut config = LoadedLabConfig::new(Arc::new(variables));
    config
        .jumpstarter_instances
        .insert("prod".to_string(), jumpstarter_instance("prod", "jumpstarter-lab"));
    config.exporter_hosts.insert("rpi-01".to_string(), exporter_host("rpi-01"));
    config
        .exporter_instances
        .insert("dut-01".to_string(), exporter_instance("dut-01", "rpi-01", "prod"));
    config
        .exporter_config_templates
        .insert("rcar-template".to_string(), config_template("rcar-template"));
    config.clients.insert("alice".to_string(), client("alice"));
    config
}
