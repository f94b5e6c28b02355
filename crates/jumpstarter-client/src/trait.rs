//! ControlPlaneClient trait for mocking
//!
//! The kube-backed client implements this trait; tests use
//! `MockControlPlaneClient` (feature `test-util`).

use crate::error::ControlPlaneError;
use crds::{Client, Exporter};
use k8s_openapi::api::core::v1::Secret;

/// Operations the lab sync needs from a Jumpstarter control plane
///
/// `namespace = None` on list operations lists across all namespaces.
/// Create and update take the namespace from the object metadata.
#[async_trait::async_trait]
pub trait ControlPlaneClientTrait: Send + Sync {
    // Clients
    async fn list_clients(&self, namespace: Option<&str>) -> Result<Vec<Client>, ControlPlaneError>;
    async fn get_client(&self, namespace: &str, name: &str) -> Result<Client, ControlPlaneError>;
    async fn create_client(&self, client: &Client) -> Result<Client, ControlPlaneError>;
    async fn update_client(&self, client: &Client) -> Result<Client, ControlPlaneError>;
    async fn delete_client(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError>;

    // Exporters
    async fn list_exporters(&self, namespace: Option<&str>) -> Result<Vec<Exporter>, ControlPlaneError>;
    async fn get_exporter(&self, namespace: &str, name: &str) -> Result<Exporter, ControlPlaneError>;
    async fn create_exporter(&self, exporter: &Exporter) -> Result<Exporter, ControlPlaneError>;
    async fn update_exporter(&self, exporter: &Exporter) -> Result<Exporter, ControlPlaneError>;
    async fn delete_exporter(&self, namespace: &str, name: &str) -> Result<(), ControlPlaneError>;

    // Credentials
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ControlPlaneError>;
}
