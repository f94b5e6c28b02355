//! Jumpstarter control-plane client
//!
//! Typed access to the Jumpstarter `Client` and `Exporter` resources and the
//! Secrets holding their issued credentials.
//!
//! # Example
//!
//! ```no_run
//! use jumpstarter_client::{ControlPlaneClientTrait, KubeControlPlaneClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeControlPlaneClient::new(kube::Client::try_default().await?);
//! for exporter in client.list_exporters(Some("jumpstarter-lab")).await? {
//!     println!("{:?}", exporter.metadata.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod jumpstarter_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeControlPlaneClient;
pub use error::ControlPlaneError;
pub use jumpstarter_trait::ControlPlaneClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockControlPlaneClient;

#[cfg(all(test, feature = "test-util"))]
mod tests {
    use super::*;
    use crds::{Exporter, ExporterSpec};
    use kube::api::ObjectMeta;

    fn exporter(name: &str) -> Exporter {
        Exporter {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("lab".to_string()),
                ..ObjectMeta::default()
            },
            spec: ExporterSpec {
                username: Some(format!("lab:{name}")),
            },
            status: None,
        }
    }

    #[tokio::test]
    async fn test_stale_resource_version_conflicts() {
        let mock = MockControlPlaneClient::new();
        let created = mock.create_exporter(&exporter("e1")).await.unwrap();

        let mut first = created.clone();
        first.spec.username = Some("first".to_string());
        mock.update_exporter(&first).await.unwrap();

        let mut second = created;
        second.spec.username = Some("second".to_string());
        let err = mock.update_exporter(&second).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_injected_conflict_then_success() {
        let mock = MockControlPlaneClient::new();
        mock.add_exporter(exporter("e1"));
        mock.fail_next_updates_with_conflict(1);

        let live = mock.get_exporter("lab", "e1").await.unwrap();
        assert!(mock.update_exporter(&live).await.unwrap_err().is_conflict());

        let refreshed = mock.get_exporter("lab", "e1").await.unwrap();
        assert_ne!(refreshed.metadata.resource_version, live.metadata.resource_version);
        mock.update_exporter(&refreshed).await.unwrap();
        assert_eq!(mock.mutations(), vec!["update exporter lab/e1".to_string()]);
    }

    #[tokio::test]
    async fn test_credentials_issued_on_create() {
        let mock = MockControlPlaneClient::new();
        mock.issue_credentials_after(0);
        mock.create_exporter(&exporter("e1")).await.unwrap();

        let stored = mock.get_exporter("lab", "e1").await.unwrap();
        let secret_name = stored.status.unwrap().credential.unwrap().name;
        let secret = mock.get_secret("lab", &secret_name).await.unwrap();
        assert_eq!(secret.data.unwrap()["token"].0, b"token-e1".to_vec());
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_found() {
        let mock = MockControlPlaneClient::new();
        assert!(mock.get_client("lab", "nope").await.unwrap_err().is_not_found());
        assert!(mock.delete_exporter("lab", "nope").await.unwrap_err().is_not_found());
        assert!(mock.get_secret("lab", "nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_without_namespace_is_rejected() {
        let mock = MockControlPlaneClient::new();
        let mut object = exporter("e1");
        object.metadata.namespace = None;
        assert!(matches!(
            mock.create_exporter(&object).await,
            Err(ControlPlaneError::InvalidRequest(_))
        ));
    }
}
