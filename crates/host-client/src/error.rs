//! Host session errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to an exporter host
#[derive(Debug, Error)]
pub enum HostError {
    /// Host definition is incomplete
    #[error("Invalid host configuration: {0}")]
    InvalidConfig(String),

    /// TCP connection could not be established
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// libssh2 reported an error
    #[error("{context}: {source}")]
    Ssh {
        context: String,
        #[source]
        source: ssh2::Error,
    },

    /// No authentication method was accepted
    #[error("authentication failed for {user}@{host} (tried: {tried})")]
    Authentication {
        host: String,
        user: String,
        tried: String,
    },

    /// Server key differs from the known_hosts entry
    #[error("host key for {host} does not match {known_hosts}")]
    HostKeyMismatch { host: String, known_hosts: PathBuf },

    /// Server key is unknown and trust-on-first-use is disabled
    #[error("host key for {host} is not in {known_hosts}")]
    UnknownHostKey { host: String, known_hosts: PathBuf },

    /// Host key could not be checked or recorded
    #[error("host key verification failed for {host}: {reason}")]
    HostKey { host: String, reason: String },

    /// Remote file I/O failed
    #[error("{operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote command exited non-zero
    #[error("command '{command}' failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
}

impl HostError {
    pub(crate) fn ssh(context: impl Into<String>) -> impl FnOnce(ssh2::Error) -> HostError {
        let context = context.into();
        move |source| HostError::Ssh { context, source }
    }
}
