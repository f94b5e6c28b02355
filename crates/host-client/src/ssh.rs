//! libssh2-backed host sessions

use crate::error::HostError;
use crate::host_trait::{CommandOutput, HostConnector, HostSessionTrait};
use crds::{ExporterHost, SshCredentials};
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, Session, Sftp};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for individual blocking libssh2 operations
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

// libssh2 LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

const DIR_MODE: i32 = 0o755;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How server host keys are verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Check against an OpenSSH known_hosts file
    KnownHosts {
        path: PathBuf,
        /// Record keys of hosts not yet in the file instead of failing
        trust_on_first_use: bool,
    },
    /// Accept any key
    AcceptAny,
}

impl HostKeyPolicy {
    /// `~/.ssh/known_hosts` with trust-on-first-use
    pub fn default_known_hosts() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
        HostKeyPolicy::KnownHosts {
            path: home.join(".ssh").join("known_hosts"),
            trust_on_first_use: true,
        }
    }
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        Self::default_known_hosts()
    }
}

/// Name under which a host is recorded in known_hosts
pub fn known_hosts_entry(host: &str, port: u16) -> String {
    if port == DEFAULT_SSH_PORT {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    }
}

/// Connects to exporter hosts over SSH
#[derive(Debug, Clone)]
pub struct SshConnector {
    host_key_policy: HostKeyPolicy,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl SshConnector {
    /// Create a connector with default timeouts
    pub fn new(host_key_policy: HostKeyPolicy) -> Self {
        Self {
            host_key_policy,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Override the TCP connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Open an authenticated session to `address:port`
    pub fn open(&self, label: &str, ssh: &SshCredentials) -> Result<SshHostSession, HostError> {
        if ssh.host.is_empty() {
            return Err(HostError::InvalidConfig(format!(
                "{label}: spec.management.ssh.host is empty"
            )));
        }
        if ssh.user.is_empty() {
            return Err(HostError::InvalidConfig(format!(
                "{label}: spec.management.ssh.user is empty"
            )));
        }
        let port = ssh.port.unwrap_or(DEFAULT_SSH_PORT);
        let address = format!("{}:{port}", ssh.host);

        let tcp = self.dial(&ssh.host, port)?;
        let mut session = Session::new().map_err(HostError::ssh("failed to create SSH session"))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(self.io_timeout.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(HostError::ssh(format!("SSH handshake with {address} failed")))?;

        self.verify_host_key(&session, &ssh.host, port)?;
        authenticate(&session, ssh)?;

        let sftp = session
            .sftp()
            .map_err(HostError::ssh(format!("failed to open SFTP channel to {address}")))?;

        info!(host = %label, address = %address, user = %ssh.user, "Connected");
        Ok(SshHostSession {
            label: label.to_string(),
            session,
            sftp,
            io_timeout: self.io_timeout,
        })
    }

    fn dial(&self, host: &str, port: u16) -> Result<TcpStream, HostError> {
        let address = format!("{host}:{port}");
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|source| HostError::Connect {
                address: address.clone(),
                source,
            })?;

        let mut last_error = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!(address = %candidate, error = %err, "Connect attempt failed");
                    last_error = Some(err);
                }
            }
        }
        Err(HostError::Connect {
            address,
            source: last_error.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            }),
        })
    }

    fn verify_host_key(&self, session: &Session, host: &str, port: u16) -> Result<(), HostError> {
        let (path, trust_on_first_use) = match &self.host_key_policy {
            HostKeyPolicy::AcceptAny => {
                warn!(host = %host, "Host key verification disabled");
                return Ok(());
            }
            HostKeyPolicy::KnownHosts {
                path,
                trust_on_first_use,
            } => (path, *trust_on_first_use),
        };

        let host_key_error = |reason: String| HostError::HostKey {
            host: host.to_string(),
            reason,
        };

        let (key, key_type) = session
            .host_key()
            .ok_or_else(|| host_key_error("server did not present a host key".to_string()))?;
        let mut known_hosts = session
            .known_hosts()
            .map_err(|e| host_key_error(e.to_string()))?;
        if path.exists() {
            known_hosts
                .read_file(path, KnownHostFileKind::OpenSSH)
                .map_err(|e| host_key_error(format!("reading {}: {e}", path.display())))?;
        }

        match known_hosts.check_port(host, port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::Mismatch => Err(HostError::HostKeyMismatch {
                host: known_hosts_entry(host, port),
                known_hosts: path.clone(),
            }),
            CheckResult::NotFound if trust_on_first_use => {
                let entry = known_hosts_entry(host, port);
                known_hosts
                    .add(&entry, key, "added by jumpstarter-lab-config", key_type.into())
                    .map_err(|e| host_key_error(e.to_string()))?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|source| HostError::Io {
                        operation: "create directory",
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                known_hosts
                    .write_file(path, KnownHostFileKind::OpenSSH)
                    .map_err(|e| host_key_error(format!("writing {}: {e}", path.display())))?;
                warn!(host = %entry, known_hosts = %path.display(), "Trusting new host key");
                Ok(())
            }
            CheckResult::NotFound => Err(HostError::UnknownHostKey {
                host: known_hosts_entry(host, port),
                known_hosts: path.clone(),
            }),
            CheckResult::Failure => Err(host_key_error("known_hosts check failed".to_string())),
        }
    }
}

impl HostConnector for SshConnector {
    fn connect(&self, host: &ExporterHost) -> Result<Box<dyn HostSessionTrait>, HostError> {
        let label = host.metadata.name.as_deref().unwrap_or("<unnamed>");
        Ok(Box::new(self.open(label, &host.spec.management.ssh)?))
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

/// Try key file, inline key, password, then the SSH agent
fn authenticate(session: &Session, ssh: &SshCredentials) -> Result<(), HostError> {
    let user = ssh.user.as_str();
    let passphrase = non_empty(ssh.ssh_key_password.as_ref());
    let mut tried: Vec<&str> = Vec::new();

    if let Some(key_file) = non_empty(ssh.key_file.as_ref()) {
        tried.push("key file");
        let path = expand_home(key_file);
        if let Err(err) = session.userauth_pubkey_file(user, None, &path, passphrase) {
            debug!(user, key_file = %path.display(), error = %err, "Key file authentication failed");
        }
        if session.authenticated() {
            return Ok(());
        }
    }

    if let Some(key_data) = non_empty(ssh.ssh_key_data.as_ref()) {
        tried.push("inline key");
        if let Err(err) = session.userauth_pubkey_memory(user, None, key_data, passphrase) {
            debug!(user, error = %err, "Inline key authentication failed");
        }
        if session.authenticated() {
            return Ok(());
        }
    }

    if let Some(password) = non_empty(ssh.password.as_ref()) {
        tried.push("password");
        if let Err(err) = session.userauth_password(user, password) {
            debug!(user, error = %err, "Password authentication failed");
        }
        if session.authenticated() {
            return Ok(());
        }
    }

    tried.push("agent");
    if let Err(err) = session.userauth_agent(user) {
        debug!(user, error = %err, "Agent authentication failed");
    }
    if session.authenticated() {
        return Ok(());
    }

    Err(HostError::Authentication {
        host: ssh.host.clone(),
        user: user.to_string(),
        tried: tried.join(", "),
    })
}

/// Switches a session to non-blocking mode until dropped
struct NonBlocking<'a>(&'a Session);

impl<'a> NonBlocking<'a> {
    fn enter(session: &'a Session) -> Self {
        session.set_blocking(false);
        Self(session)
    }
}

impl Drop for NonBlocking<'_> {
    fn drop(&mut self) {
        self.0.set_blocking(true);
    }
}

/// Read one chunk; `Ok(true)` once the stream hit EOF
fn read_chunk(stream: &mut impl Read, out: &mut Vec<u8>, progressed: &mut bool) -> std::io::Result<bool> {
    let mut buffer = [0u8; 8192];
    match stream.read(&mut buffer) {
        Ok(0) => Ok(true),
        Ok(n) => {
            out.extend_from_slice(&buffer[..n]);
            *progressed = true;
            Ok(false)
        }
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
        Err(err) => Err(err),
    }
}

/// Interleave stdout and stderr reads so a full stderr window cannot stall stdout
fn drain_output(channel: &mut ssh2::Channel, timeout: Duration) -> std::io::Result<(String, String)> {
    let deadline = Instant::now() + timeout;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let (mut stdout_done, mut stderr_done) = (false, false);

    while !(stdout_done && stderr_done) {
        let mut progressed = false;
        if !stdout_done {
            stdout_done = read_chunk(channel, &mut stdout, &mut progressed)?;
        }
        if !stderr_done {
            stderr_done = read_chunk(&mut channel.stderr(), &mut stderr, &mut progressed)?;
        }
        if !progressed {
            if Instant::now() >= deadline {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timed out waiting for command output",
                ));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

/// Authenticated SSH connection with an open SFTP channel
pub struct SshHostSession {
    label: String,
    session: Session,
    sftp: Sftp,
    io_timeout: Duration,
}

impl std::fmt::Debug for SshHostSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshHostSession")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl SshHostSession {
    fn io_error(operation: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> HostError {
        let path = path.to_path_buf();
        move |source| HostError::Io {
            operation,
            path,
            source,
        }
    }
}

impl HostSessionTrait for SshHostSession {
    fn host(&self) -> &str {
        &self.label
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        let mut file = match self.sftp.open(path) {
            Ok(file) => file,
            Err(err) if matches!(err.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => return Ok(None),
            Err(err) => {
                return Err(HostError::Ssh {
                    context: format!("failed to open {}", path.display()),
                    source: err,
                });
            }
        };
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(Self::io_error("read", path))?;
        Ok(Some(content))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<(), HostError> {
        let mut file = self
            .sftp
            .create(path)
            .map_err(HostError::ssh(format!("failed to create {}", path.display())))?;
        file.write_all(content.as_bytes())
            .map_err(Self::io_error("write", path))?;
        file.flush().map_err(Self::io_error("flush", path))?;
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), HostError> {
        let mut missing: Vec<&Path> = path
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .take_while(|p| self.sftp.stat(p).is_err())
            .collect();
        missing.reverse();
        for dir in missing {
            if let Err(err) = self.sftp.mkdir(dir, DIR_MODE) {
                // lost a race with another writer
                if self.sftp.stat(dir).is_err() {
                    return Err(HostError::Ssh {
                        context: format!("failed to create directory {}", dir.display()),
                        source: err,
                    });
                }
            }
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), HostError> {
        self.sftp
            .unlink(path)
            .map_err(HostError::ssh(format!("failed to remove {}", path.display())))
    }

    fn run_command(&self, command: &str) -> Result<CommandOutput, HostError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(HostError::ssh("failed to open exec channel"))?;
        channel
            .exec(command)
            .map_err(HostError::ssh(format!("failed to execute '{command}'")))?;

        let (stdout, stderr) = {
            let _nonblocking = NonBlocking::enter(&self.session);
            drain_output(&mut channel, self.io_timeout).map_err(|source| HostError::Io {
                operation: "read output of",
                path: PathBuf::from(command),
                source,
            })?
        };

        channel
            .wait_close()
            .map_err(HostError::ssh(format!("failed to close channel for '{command}'")))?;
        let exit_code = channel
            .exit_status()
            .map_err(HostError::ssh(format!("failed to read exit status of '{command}'")))?;

        debug!(host = %self.label, command, exit_code, "Command finished");
        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
