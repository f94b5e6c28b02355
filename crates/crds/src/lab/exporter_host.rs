//! ExporterHost: a Linux machine running one or more exporter services

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ExporterHostSpec describes how to reach and power a host
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "meta.jumpstarter.dev",
    version = "v1alpha1",
    kind = "ExporterHost",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ExporterHostSpec {
    /// Physical placement of the host
    #[serde(default)]
    pub location_ref: LocationRef,

    /// Default exporter container image for this host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,

    /// Network addresses of the host
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,

    /// Power control
    #[serde(default)]
    pub power: Power,

    /// Management access
    #[serde(default)]
    pub management: Management,
}

/// Physical location reference (rack / tray within a location)
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationRef {
    /// PhysicalLocation name
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tray: Option<String>,
}

/// Power control options
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Power {
    /// SNMP-controlled PDU outlet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snmp: Option<SnmpPower>,
}

/// SNMP PDU outlet
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnmpPower {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub oid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plug: Option<u32>,
}

/// Management access
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Management {
    /// SSH access used for file and service sync
    #[serde(default)]
    pub ssh: SshCredentials,
}

/// SSH connection parameters
///
/// Authentication methods are tried in order: `key_file`, `ssh_key_data`,
/// `password`, then the local SSH agent.
#[derive(Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SshCredentials {
    /// Host name or address
    #[serde(default)]
    pub host: String,

    /// Login user
    #[serde(default)]
    pub user: String,

    /// Path to a private key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    /// Inline private key (PEM / OpenSSH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_data: Option<String>,

    /// Passphrase for the private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_password: Option<String>,

    /// Password authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// SSH port, defaults to 22
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl std::fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redacted(value: Option<&String>) -> Option<&'static str> {
            value.map(|_| "<redacted>")
        }
        f.debug_struct("SshCredentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("key_file", &self.key_file)
            .field("ssh_key_data", &redacted(self.ssh_key_data.as_ref()))
            .field("ssh_key_password", &redacted(self.ssh_key_password.as_ref()))
            .field("password", &redacted(self.password.as_ref()))
            .field("port", &self.port)
            .finish()
    }
}

templating::templatable!(resource ExporterHost);
templating::templatable!(ExporterHostSpec { location_ref, container_image, addresses, power, management });
templating::templatable!(LocationRef { name, rack, tray });
templating::templatable!(Power { snmp });
templating::templatable!(SnmpPower { host, user, password, oid, plug });
templating::templatable!(Management { ssh });
templating::templatable!(SshCredentials { host, user, key_file, ssh_key_data, ssh_key_password, password, port });
