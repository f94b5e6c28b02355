//! Host session traits
//!
//! Sessions are blocking; callers on an async runtime run them on a blocking
//! thread. One session owns one SSH connection and one SFTP channel, both
//! closed when the session is dropped.

use crate::error::HostError;
use crds::ExporterHost;
use std::path::Path;

/// Result of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status reported by the remote shell
    pub exit_code: i32,
    /// Everything the command wrote to stdout
    pub stdout: String,
    /// Everything the command wrote to stderr
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// File and command operations on a connected host
pub trait HostSessionTrait: Send {
    /// Host label used in logs
    fn host(&self) -> &str;

    /// Read a file; `Ok(None)` if it does not exist
    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError>;

    /// Create or truncate a file with `content`
    fn write_file(&self, path: &Path, content: &str) -> Result<(), HostError>;

    /// Create a directory and all missing parents
    fn create_dir_all(&self, path: &Path) -> Result<(), HostError>;

    /// Remove a file
    fn remove_file(&self, path: &Path) -> Result<(), HostError>;

    /// Run a command, collecting stdout, stderr and exit status
    fn run_command(&self, command: &str) -> Result<CommandOutput, HostError>;

    /// Run a command and fail on a non-zero exit status
    fn run_checked(&self, command: &str) -> Result<CommandOutput, HostError> {
        let output = self.run_command(command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(HostError::CommandFailed {
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Opens sessions to exporter hosts
pub trait HostConnector: Send + Sync {
    /// Connect and authenticate using the host's management SSH settings
    fn connect(&self, host: &ExporterHost) -> Result<Box<dyn HostSessionTrait>, HostError>;
}
