//! In-memory host sessions for unit testing
//!
//! [`MockHostConnector`] hands out [`MockHostSession`]s that share one
//! filesystem per host name, so a test can seed files before a sync and
//! inspect them afterwards.

use crate::error::HostError;
use crate::host_trait::{CommandOutput, HostConnector, HostSessionTrait};
use crds::ExporterHost;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct HostState {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
    // Every command run, in order
    commands: Vec<String>,
    // Every mutating call ("write /path", "mkdir /path", "run cmd", ...)
    mutations: Vec<String>,
    outputs: HashMap<String, CommandOutput>,
    failing_writes: BTreeSet<PathBuf>,
}

/// Mock session backed by an in-memory filesystem
#[derive(Debug, Clone, Default)]
pub struct MockHostSession {
    host: String,
    state: Arc<Mutex<HostState>>,
}

impl MockHostSession {
    /// Create a session for `host` with an empty filesystem
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: Arc::default(),
        }
    }

    /// Seed a file (for test setup)
    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        lock(&self.state).files.insert(path.into(), content.into());
    }

    /// Current file content
    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.state).files.get(path.as_ref()).cloned()
    }

    /// Whether a directory was created
    pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        lock(&self.state).dirs.contains(path.as_ref())
    }

    /// Script the output of a command; unscripted commands succeed silently
    pub fn set_command_output(&self, command: &str, exit_code: i32, stdout: &str, stderr: &str) {
        lock(&self.state).outputs.insert(
            command.to_string(),
            CommandOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
    }

    /// Make writes to `path` fail
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        lock(&self.state).failing_writes.insert(path.into());
    }

    /// Commands run so far, in order
    pub fn commands(&self) -> Vec<String> {
        lock(&self.state).commands.clone()
    }

    /// Mutating calls performed so far, in order
    pub fn mutations(&self) -> Vec<String> {
        lock(&self.state).mutations.clone()
    }
}

impl HostSessionTrait for MockHostSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        Ok(lock(&self.state).files.get(path).cloned())
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        if state.failing_writes.contains(path) {
            return Err(HostError::Io {
                operation: "write",
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            });
        }
        state.files.insert(path.to_path_buf(), content.to_string());
        state.mutations.push(format!("write {}", path.display()));
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        if state.dirs.insert(path.to_path_buf()) {
            state.mutations.push(format!("mkdir {}", path.display()));
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), HostError> {
        let mut state = lock(&self.state);
        if state.files.remove(path).is_none() {
            return Err(HostError::Io {
                operation: "remove",
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        state.mutations.push(format!("remove {}", path.display()));
        Ok(())
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput, HostError> {
        let mut state = lock(&self.state);
        state.commands.push(command.to_string());
        state.mutations.push(format!("run {command}"));
        Ok(state.outputs.get(command).cloned().unwrap_or_default())
    }
}

/// Mock connector handing out one [`MockHostSession`] per host name
#[derive(Debug, Clone, Default)]
pub struct MockHostConnector {
    sessions: Arc<Mutex<BTreeMap<String, MockHostSession>>>,
    // SSH hosts (after templating) that were connected to, in order
    connections: Arc<Mutex<Vec<String>>>,
    failing_hosts: Arc<Mutex<BTreeSet<String>>>,
}

impl MockHostConnector {
    /// Create a connector with no hosts
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for the ExporterHost named `name`, created on first use
    pub fn session(&self, name: &str) -> MockHostSession {
        lock(&self.sessions)
            .entry(name.to_string())
            .or_insert_with(|| MockHostSession::new(name))
            .clone()
    }

    /// Make connections to the ExporterHost named `name` fail
    pub fn fail_host(&self, name: &str) {
        lock(&self.failing_hosts).insert(name.to_string());
    }

    /// `spec.management.ssh.host` of every connection attempt, in order
    pub fn connections(&self) -> Vec<String> {
        lock(&self.connections).clone()
    }
}

impl HostConnector for MockHostConnector {
    fn connect(&self, host: &ExporterHost) -> Result<Box<dyn HostSessionTrait>, HostError> {
        let name = host.metadata.name.clone().unwrap_or_default();
        let address = host.spec.management.ssh.host.clone();
        lock(&self.connections).push(address.clone());

        if lock(&self.failing_hosts).contains(&name) {
            return Err(HostError::Connect {
                address,
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }
        Ok(Box::new(self.session(&name)))
    }
}
