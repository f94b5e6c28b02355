//! Lab-config error types.
//!
//! Every variant names the entity it failed on so the message printed by
//! `main` reads as a causal chain from the run down to the backend error.

use host_client::HostError;
use jumpstarter_client::ControlPlaneError;
use lab_vars::{VarsError, VaultError};
use std::path::PathBuf;
use templating::TemplateError;
use thiserror::Error;

/// Errors that can occur while loading or applying a lab configuration.
#[derive(Debug, Error)]
pub enum LabConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid YAML for the expected type
    #[error("failed to parse {path} (document {document}): {source}")]
    Yaml {
        path: PathBuf,
        document: usize,
        #[source]
        source: serde_yaml::Error,
    },

    /// File holds no YAML documents
    #[error("no valid YAML documents found in {path}")]
    EmptyFile { path: PathBuf },

    /// Source glob is malformed
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Document kind does not match the source category it was listed under
    #[error("{path} document {document}: expected kind {expected}, found {found}")]
    KindMismatch {
        path: PathBuf,
        document: usize,
        expected: String,
        found: String,
    },

    /// Document has no `metadata.name`
    #[error("{path} document {document}: {kind} is missing metadata.name")]
    MissingName {
        path: PathBuf,
        document: usize,
        kind: String,
    },

    /// Two documents of the same kind share a name
    #[error("duplicate {kind} name '{name}' in {path} (originally defined in {original})")]
    DuplicateName {
        kind: String,
        name: String,
        path: PathBuf,
        original: PathBuf,
    },

    /// Variable store error
    #[error("variables: {0}")]
    Variables(#[from] VarsError),

    /// Vault password could not be loaded
    #[error("vault password: {0}")]
    Vault(#[from] VaultError),

    /// Rendering an entity failed
    #[error("error applying template for {entity}: {source}")]
    Template {
        entity: String,
        #[source]
        source: TemplateError,
    },

    /// Entity references an object that is not in the configuration
    #[error("{referenced_by}: {kind} {name} not found")]
    MissingReference {
        kind: &'static str,
        name: String,
        referenced_by: String,
    },

    /// Name filter is not a valid regular expression
    #[error("invalid {what} filter regexp '{pattern}': {source}")]
    InvalidFilter {
        what: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Kubeconfig could not be loaded for an instance
    #[error("[{instance}] failed to load kubeconfig: {source}")]
    Kubeconfig {
        instance: String,
        #[source]
        source: kube::config::KubeconfigError,
    },

    /// Control-plane call failed
    #[error("[{instance}] failed to {operation} {kind} {name}: {source}")]
    ControlPlane {
        instance: String,
        operation: &'static str,
        kind: &'static str,
        name: String,
        #[source]
        source: ControlPlaneError,
    },

    /// Update kept conflicting with concurrent writers
    #[error("[{instance}] failed to update {kind} {name} after {attempts} attempts due to conflicts")]
    ConflictRetryExhausted {
        instance: String,
        kind: &'static str,
        name: String,
        attempts: u32,
    },

    /// Exporter credentials were not issued in time
    #[error("[{instance}] failed to get exporter credentials for {name} after {attempts} attempts, last error: {last_error}")]
    CredentialTimeout {
        instance: String,
        name: String,
        attempts: u32,
        last_error: String,
    },

    /// Credential Secret has no `token` key
    #[error("secret {secret} does not contain a token")]
    MissingToken { secret: String },

    /// Object could not be serialized for diffing
    #[error("failed to serialize {kind} {name}: {source}")]
    Serialize {
        kind: &'static str,
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Exporter host operation failed
    #[error("exporter host {host}: {context}: {source}")]
    Host {
        host: String,
        context: String,
        #[source]
        source: HostError,
    },

    /// Rendered template sets both systemd unit kinds
    #[error("exporter config template {template}: both systemdContainerTemplate and systemdServiceTemplate specified - only one should be used")]
    BothServiceTemplates { template: String },

    /// No credentials were collected for an exporter instance
    #[error("service parameters not found for {0}")]
    MissingServiceParameters(String),

    /// Configuration is incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl LabConfigError {
    /// Wrap a template error with the entity it was rendering
    pub fn template(entity: impl Into<String>) -> impl FnOnce(TemplateError) -> Self {
        let entity = entity.into();
        move |source| LabConfigError::Template { entity, source }
    }

    /// Wrap a host error with the host and the step that failed
    pub fn host(host: impl Into<String>, context: impl Into<String>) -> impl FnOnce(HostError) -> Self {
        let host = host.into();
        let context = context.into();
        move |source| LabConfigError::Host {
            host,
            context,
            source,
        }
    }
}
