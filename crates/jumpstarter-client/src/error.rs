//! Control-plane client errors

use thiserror::Error;

/// Errors that can occur when talking to a Jumpstarter control plane
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Kubernetes API or transport error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object with that name already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic-concurrency conflict (stale resourceVersion)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request is incomplete (e.g. object without namespace)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ControlPlaneError {
    /// Map a kube error, turning 404/409 into typed variants
    pub fn from_kube(err: kube::Error, operation: &str, kind: &str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(ref api_err) if api_err.code == 404 => {
                ControlPlaneError::NotFound(format!("{kind} {namespace}/{name}"))
            }
            kube::Error::Api(ref api_err) if api_err.code == 409 && operation == "create" => {
                ControlPlaneError::AlreadyExists(format!("{kind} {namespace}/{name}"))
            }
            kube::Error::Api(ref api_err) if api_err.code == 409 => ControlPlaneError::Conflict(
                format!("{operation} {kind} {namespace}/{name}: {}", api_err.message),
            ),
            other => ControlPlaneError::Kube(other),
        }
    }

    /// Whether retrying after a re-read may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, ControlPlaneError::Conflict(_))
    }

    /// Whether the target object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlPlaneError::NotFound(_))
    }
}
