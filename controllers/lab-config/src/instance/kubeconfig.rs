//! Kubeconfig resolution for a JumpstarterInstance
//!
//! An inline `spec.kubeconfig` wins; otherwise `KUBECONFIG` or
//! `~/.kube/config` is read. `spec.kube-context` selects the context, the
//! kubeconfig's current context is used when it is unset.

use crate::error::LabConfigError;
use crds::JumpstarterInstance;
use jumpstarter_client::KubeControlPlaneClient;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::{debug, info};

/// Kubeconfig options selecting the instance's context
pub fn config_options(instance: &JumpstarterInstance) -> KubeConfigOptions {
    KubeConfigOptions {
        context: instance.spec.kube_context.clone().filter(|c| !c.is_empty()),
        cluster: None,
        user: None,
    }
}

/// Resolve the kube client configuration for `instance`
pub async fn load_config(instance: &JumpstarterInstance) -> Result<kube::Config, LabConfigError> {
    let name = instance.metadata.name.clone().unwrap_or_default();
    let options = config_options(instance);
    let to_error = |source| LabConfigError::Kubeconfig {
        instance: name.clone(),
        source,
    };

    match instance.spec.kubeconfig.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(inline) => {
            debug!(instance = %name, context = ?options.context, "Using inline kubeconfig");
            let kubeconfig = Kubeconfig::from_yaml(inline).map_err(to_error)?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(to_error)
        }
        None => {
            debug!(instance = %name, context = ?options.context, "Using kubeconfig from environment");
            kube::Config::from_kubeconfig(&options).await.map_err(to_error)
        }
    }
}

/// Build a control-plane client for `instance`
pub async fn connect(instance: &JumpstarterInstance) -> Result<KubeControlPlaneClient, LabConfigError> {
    let config = load_config(instance).await?;
    let name = instance.metadata.name.as_deref().unwrap_or_default();
    info!(instance = %name, cluster = %config.cluster_url, "Connecting to control plane");
    KubeControlPlaneClient::try_from_config(config).map_err(|source| LabConfigError::ControlPlane {
        instance: name.to_string(),
        operation: "connect to",
        kind: "control plane",
        name: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::JumpstarterInstanceSpec;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: staging
clusters:
  - name: prod
    cluster:
      server: https://prod.example.com:6443
  - name: staging
    cluster:
      server: https://staging.example.com:6443
contexts:
  - name: prod
    context:
      cluster: prod
      user: admin
  - name: staging
    context:
      cluster: staging
      user: admin
users:
  - name: admin
    user:
      token: not-a-real-token
"#;

    fn instance(context: Option<&str>) -> JumpstarterInstance {
        JumpstarterInstance::new(
            "prod",
            JumpstarterInstanceSpec {
                kube_context: context.map(str::to_string),
                kubeconfig: Some(KUBECONFIG.to_string()),
                namespace: Some("jumpstarter-lab".to_string()),
                ..JumpstarterInstanceSpec::default()
            },
        )
    }

    #[tokio::test]
    async fn test_inline_kubeconfig_selects_context() {
        let config = load_config(&instance(Some("prod"))).await.unwrap();
        assert_eq!(config.cluster_url.host(), Some("prod.example.com"));
    }

    #[tokio::test]
    async fn test_inline_kubeconfig_uses_current_context() {
        let config = load_config(&instance(None)).await.unwrap();
        assert_eq!(config.cluster_url.host(), Some("staging.example.com"));
    }

    #[tokio::test]
    async fn test_unknown_context_is_an_error() {
        let err = load_config(&instance(Some("missing"))).await.unwrap_err();
        assert!(matches!(err, LabConfigError::Kubeconfig { ref instance, .. } if instance == "prod"));
    }
}
