//! Async handle over a blocking host session
//!
//! Every call runs on tokio's blocking pool; the session sits behind a mutex
//! so calls on one host are serialized.

use crate::error::LabConfigError;
use crds::ExporterHost;
use host_client::{CommandOutput, HostConnector, HostError, HostSessionTrait};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

type SharedSession = Arc<Mutex<Box<dyn HostSessionTrait>>>;

/// Connected exporter host
#[derive(Clone)]
pub struct RemoteHost {
    name: String,
    session: SharedSession,
}

impl std::fmt::Debug for RemoteHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHost").field("name", &self.name).finish_non_exhaustive()
    }
}

impl RemoteHost {
    /// Open a session to a rendered ExporterHost
    pub async fn connect(connector: Arc<dyn HostConnector>, host: &ExporterHost) -> Result<Self, LabConfigError> {
        let name = host.metadata.name.clone().unwrap_or_default();
        let target = host.clone();
        let session = tokio::task::spawn_blocking(move || connector.connect(&target))
            .await?
            .map_err(LabConfigError::host(name.clone(), "connect"))?;
        Ok(Self {
            name,
            session: Arc::new(Mutex::new(session)),
        })
    }

    /// ExporterHost name
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn call<T, F>(&self, context: String, f: F) -> Result<T, LabConfigError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn HostSessionTrait) -> Result<T, HostError> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        let result = tokio::task::spawn_blocking(move || {
            let guard = session.lock().unwrap_or_else(PoisonError::into_inner);
            f(&**guard)
        })
        .await?;
        result.map_err(LabConfigError::host(self.name.as_str(), context))
    }

    /// Read a file; `None` if it does not exist
    pub async fn read_file(&self, path: &Path) -> Result<Option<String>, LabConfigError> {
        let path = path.to_path_buf();
        self.call(format!("read {}", path.display()), move |s| s.read_file(&path))
            .await
    }

    /// Write a file, creating its parent directory first
    pub async fn write_file(&self, path: &Path, content: &str, create_parent: bool) -> Result<(), LabConfigError> {
        let path = path.to_path_buf();
        let content = content.to_string();
        self.call(format!("write {}", path.display()), move |s| {
            if create_parent && let Some(parent) = path.parent().filter(|p| p != &Path::new("/")) {
                s.create_dir_all(parent)?;
            }
            s.write_file(&path, &content)
        })
        .await
    }

    /// Remove a file
    pub async fn remove_file(&self, path: &Path) -> Result<(), LabConfigError> {
        let path: PathBuf = path.to_path_buf();
        self.call(format!("remove {}", path.display()), move |s| s.remove_file(&path))
            .await
    }

    /// Run a command and return its output whatever the exit status
    pub async fn run_command(&self, command: &str) -> Result<CommandOutput, LabConfigError> {
        let command = command.to_string();
        self.call(format!("run '{command}'"), move |s| s.run_command(&command))
            .await
    }

    /// Run a command, failing on a non-zero exit status
    pub async fn run_checked(&self, command: &str) -> Result<CommandOutput, LabConfigError> {
        let command = command.to_string();
        self.call(format!("run '{command}'"), move |s| s.run_checked(&command))
            .await
    }
}
