//! Exporter host access over SSH
//!
//! A [`HostConnector`] opens a [`HostSessionTrait`] session to an
//! `ExporterHost` using its `spec.management.ssh` settings. Sessions read and
//! write files over SFTP and run commands over an exec channel.
//!
//! [`SshConnector`] is the libssh2 implementation; `MockHostConnector`
//! (feature `test-util`) keeps an in-memory filesystem per host.

pub mod error;
#[path = "trait.rs"]
pub mod host_trait;
#[cfg(feature = "test-util")]
pub mod mock;
pub mod ssh;

pub use error::HostError;
pub use host_trait::{CommandOutput, HostConnector, HostSessionTrait};
#[cfg(feature = "test-util")]
pub use mock::{MockHostConnector, MockHostSession};
pub use ssh::{HostKeyPolicy, SshConnector, SshHostSession};

#[cfg(all(test, feature = "test-util"))]
mod tests {
    use super::*;
    use crds::{ExporterHost, ExporterHostSpec};
    use std::path::Path;

    fn host(name: &str, address: &str) -> ExporterHost {
        let mut spec = ExporterHostSpec::default();
        spec.management.ssh.host = address.to_string();
        spec.management.ssh.user = "root".to_string();
        ExporterHost::new(name, spec)
    }

    #[test]
    fn test_sessions_share_state_per_host() {
        let connector = MockHostConnector::new();
        let session = connector.connect(&host("h1", "10.0.0.1")).unwrap();
        session.write_file(Path::new("/etc/a"), "x").unwrap();

        assert_eq!(connector.session("h1").file("/etc/a").as_deref(), Some("x"));
        assert_eq!(connector.session("h2").file("/etc/a"), None);
        assert_eq!(connector.connections(), vec!["10.0.0.1".to_string()]);
    }

    #[test]
    fn test_failing_host() {
        let connector = MockHostConnector::new();
        connector.fail_host("h1");
        assert!(matches!(
            connector.connect(&host("h1", "10.0.0.1")),
            Err(HostError::Connect { .. })
        ));
    }

    #[test]
    fn test_run_checked_reports_exit_code() {
        let session = MockHostSession::new("h1");
        session.set_command_output("systemctl restart x", 5, "", "unit not found\n");

        match session.run_checked("systemctl restart x") {
            Err(HostError::CommandFailed {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, 5);
                assert_eq!(stderr, "unit not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(session.run_checked("true").unwrap().success());
        assert_eq!(session.commands(), vec!["systemctl restart x", "true"]);
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let session = MockHostSession::new("h1");
        assert_eq!(session.read_file(Path::new("/nope")).unwrap(), None);
        assert!(session.remove_file(Path::new("/nope")).is_err());
    }
}
