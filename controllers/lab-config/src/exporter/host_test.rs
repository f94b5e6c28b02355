//! Unit tests for exporter host file sync

use super::*;
use crate::test_utils::{exporter_host, lab_config, lab_variables};
use host_client::{HostError, MockHostConnector};

const CONTAINER_UNIT: &str = "/etc/containers/systemd/exporter-dut-01.container";
const SERVICE_UNIT: &str = "/etc/systemd/system/exporter-dut-01.service";
const EXPORTER_CONFIG: &str = "/etc/jumpstarter/exporters/exporter-dut-01.yaml";

const APPLY: HostSyncOptions = HostSyncOptions {
    dry_run: false,
    debug_configs: false,
};

fn credentials(token: &str) -> BTreeMap<String, ServiceParameters> {
    BTreeMap::from([(
        "dut-01".to_string(),
        ServiceParameters {
            token: token.to_string(),
            tls_ca: String::new(),
        },
    )])
}

async fn sync(
    config: &LoadedLabConfig,
    connector: &MockHostConnector,
    parameters: &BTreeMap<String, ServiceParameters>,
    options: HostSyncOptions,
    filter: Option<&NameFilter>,
) -> Result<BTreeMap<String, SyncReport>, LabConfigError> {
    let engine = TemplateEngine::new(Arc::clone(&config.variables), None);
    ExporterHostSyncer::new(config, &engine, parameters, options, filter, Arc::new(connector.clone()))
        .sync_exporter_hosts()
        .await
}

fn use_service_unit(config: &mut LoadedLabConfig) {
    let spec = &mut config.exporter_config_templates.get_mut("rcar-template").unwrap().spec;
    spec.systemd_container_template = String::new();
    spec.systemd_service_template = "[Service]\nExecStart=/usr/bin/jmp run --exporter $(params.dut)\n".to_string();
}

#[tokio::test]
async fn test_first_sync_writes_files_and_restarts() {
    let config = lab_config(lab_variables());
    let connector = MockHostConnector::new();

    let reports = sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap();

    assert_eq!(reports["dut-01"].created, vec![CONTAINER_UNIT, EXPORTER_CONFIG]);
    assert_eq!(connector.connections(), vec!["rpi-01.lab.example.com"]);

    let session = connector.session("rpi-01");
    assert!(session.has_dir("/etc/containers/systemd"));
    assert!(session.has_dir("/etc/jumpstarter/exporters"));
    assert_eq!(
        session.file(EXPORTER_CONFIG).unwrap(),
        "endpoint: grpc.lab.example.com:443\ntoken: tok-123\nnamespace: jumpstarter-lab\nlabels:\n  board: rcar-s4\n"
    );
    assert!(
        session
            .file(CONTAINER_UNIT)
            .unwrap()
            .contains("Image=quay.io/jumpstarter-dev/jumpstarter:latest")
    );
    assert_eq!(session.file(SERVICE_UNIT), None);
    // No service unit was written, so nothing is enabled
    assert_eq!(
        session.commands(),
        vec!["ls -la", "systemctl daemon-reload", "systemctl restart exporter-dut-01"]
    );
}

#[tokio::test]
async fn test_second_sync_changes_nothing() {
    let config = lab_config(lab_variables());
    let connector = MockHostConnector::new();
    let parameters = credentials("tok-123");

    sync(&config, &connector, &parameters, APPLY, None).await.unwrap();
    let session = connector.session("rpi-01");
    let after_first = session.mutations();

    let reports = sync(&config, &connector, &parameters, APPLY, None).await.unwrap();

    assert!(!reports["dut-01"].has_changes());
    assert_eq!(reports["dut-01"].unchanged, vec![CONTAINER_UNIT, EXPORTER_CONFIG]);
    let mut expected = after_first;
    expected.push("run ls -la".to_string());
    assert_eq!(session.mutations(), expected);
}

#[tokio::test]
async fn test_empty_template_removes_file() {
    let config = lab_config(lab_variables());
    let connector = MockHostConnector::new();
    let session = connector.session("rpi-01");
    session.add_file(SERVICE_UNIT, "[Service]\nExecStart=/bin/old\n");

    let reports = sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap();

    assert_eq!(reports["dut-01"].deleted, vec![SERVICE_UNIT]);
    assert_eq!(session.file(SERVICE_UNIT), None);
    assert!(!session.commands().contains(&"systemctl enable exporter-dut-01".to_string()));
}

#[tokio::test]
async fn test_service_unit_change_enables_service() {
    let mut config = lab_config(lab_variables());
    use_service_unit(&mut config);
    let connector = MockHostConnector::new();

    sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap();

    let session = connector.session("rpi-01");
    assert_eq!(
        session.file(SERVICE_UNIT).unwrap(),
        "[Service]\nExecStart=/usr/bin/jmp run --exporter dut-01\n"
    );
    assert_eq!(
        session.commands(),
        vec![
            "ls -la",
            "systemctl daemon-reload",
            "systemctl enable exporter-dut-01",
            "systemctl restart exporter-dut-01",
        ]
    );
}

#[tokio::test]
async fn test_config_only_change_restarts_without_enable() {
    let mut config = lab_config(lab_variables());
    use_service_unit(&mut config);
    let connector = MockHostConnector::new();
    sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap();
    let session = connector.session("rpi-01");
    let commands_before = session.commands().len();

    let reports = sync(&config, &connector, &credentials("tok-456"), APPLY, None)
        .await
        .unwrap();

    assert_eq!(reports["dut-01"].updated, vec![EXPORTER_CONFIG]);
    assert!(session.file(EXPORTER_CONFIG).unwrap().contains("token: tok-456"));
    assert_eq!(
        session.commands()[commands_before..],
        ["ls -la", "systemctl daemon-reload", "systemctl restart exporter-dut-01"]
    );
}

#[tokio::test]
async fn test_both_unit_templates_are_rejected() {
    let mut config = lab_config(lab_variables());
    config
        .exporter_config_templates
        .get_mut("rcar-template")
        .unwrap()
        .spec
        .systemd_service_template = "[Service]\n".to_string();
    let connector = MockHostConnector::new();

    let err = sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap_err();

    assert!(matches!(err, LabConfigError::BothServiceTemplates { ref template } if template == "rcar-template"));
    assert_eq!(connector.session("rpi-01").mutations(), vec!["run ls -la"]);
}

#[tokio::test]
async fn test_dry_run_only_reads() {
    let config = lab_config(lab_variables());
    let connector = MockHostConnector::new();
    let session = connector.session("rpi-01");
    session.add_file(SERVICE_UNIT, "[Service]\n");
    let options = HostSyncOptions {
        dry_run: true,
        debug_configs: true,
    };

    let reports = sync(&config, &connector, &credentials("dry-run"), options, None)
        .await
        .unwrap();

    assert_eq!(reports["dut-01"].created, vec![CONTAINER_UNIT, EXPORTER_CONFIG]);
    assert_eq!(reports["dut-01"].deleted, vec![SERVICE_UNIT]);
    assert_eq!(session.mutations(), vec!["run ls -la"]);
    assert!(session.file(SERVICE_UNIT).is_some());
}

#[tokio::test]
async fn test_missing_service_parameters() {
    let config = lab_config(lab_variables());
    let connector = MockHostConnector::new();

    let err = sync(&config, &connector, &BTreeMap::new(), APPLY, None)
        .await
        .unwrap_err();

    assert!(matches!(err, LabConfigError::MissingServiceParameters(ref name) if name == "dut-01"));
}

#[tokio::test]
async fn test_hosts_without_selected_instances_are_skipped() {
    let mut config = lab_config(lab_variables());
    config.exporter_hosts.insert("rpi-02".to_string(), exporter_host("rpi-02"));
    let connector = MockHostConnector::new();

    sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap();
    assert_eq!(connector.connections(), vec!["rpi-01.lab.example.com"]);

    let filter = NameFilter::new("exporter", "^dut-02$").unwrap();
    let reports = sync(&config, &connector, &credentials("tok-123"), APPLY, Some(&filter))
        .await
        .unwrap();
    assert!(reports.is_empty());
    assert_eq!(connector.connections().len(), 1);
}

#[tokio::test]
async fn test_connection_failure_names_host() {
    let config = lab_config(lab_variables());
    let connector = MockHostConnector::new();
    connector.fail_host("rpi-01");

    let err = sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap_err();

    match err {
        LabConfigError::Host {
            host,
            context,
            source: HostError::Connect { .. },
        } => {
            assert_eq!(host, "rpi-01");
            assert_eq!(context, "connect");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_failed_status_check_aborts_host() {
    let config = lab_config(lab_variables());
    let connector = MockHostConnector::new();
    let session = connector.session("rpi-01");
    session.set_command_output("ls -la", 2, "", "Permission denied");

    let err = sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap_err();

    match err {
        LabConfigError::Host {
            host,
            source: HostError::CommandFailed { command, exit_code, stderr },
            ..
        } => {
            assert_eq!(host, "rpi-01");
            assert_eq!(command, "ls -la");
            assert_eq!(exit_code, 2);
            assert_eq!(stderr, "Permission denied");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.mutations(), vec!["run ls -la"]);
    assert_eq!(session.file(EXPORTER_CONFIG), None);
}

#[tokio::test]
async fn test_failed_restart_is_reported() {
    let config = lab_config(lab_variables());
    let connector = MockHostConnector::new();
    connector
        .session("rpi-01")
        .set_command_output("systemctl restart exporter-dut-01", 5, "", "Unit not found.\n");

    let err = sync(&config, &connector, &credentials("tok-123"), APPLY, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LabConfigError::Host {
            source: HostError::CommandFailed { exit_code: 5, .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_file_diff_is_redacted() {
    let connector = MockHostConnector::new();
    let lab = lab_config(lab_variables());
    let mut host = lab.exporter_hosts["rpi-01"].clone();
    host.spec.management.ssh.host = "10.0.0.5".to_string();
    let remote = RemoteHost::connect(Arc::new(connector.clone()), &host).await.unwrap();
    let files = ExporterFiles::new("exporter-dut-01");
    let target = HostFiles {
        host: &remote,
        scope: "rpi-01/exporter-dut-01".to_string(),
        files: &files,
    };
    let live = HostFile {
        path: files.config.clone(),
        content: "endpoint: grpc:443\ntoken: old-secret\n".to_string(),
    };

    let diff = target
        .diff(&live, &"endpoint: grpc:443\ntoken: new-secret\n".to_string())
        .unwrap()
        .unwrap();

    assert!(diff.contains("-token: <TOKEN>"));
    assert!(diff.contains("+token: <TOKEN>"));
    assert!(!diff.contains("secret"));
    assert!(diff.contains("--- existing"));
    assert_eq!(target.diff(&live, &live.content).unwrap(), None);
}

#[test]
fn test_exporter_file_paths() {
    let files = ExporterFiles::new("exporter-dut-01");
    assert_eq!(files.container_unit, Path::new(CONTAINER_UNIT));
    assert_eq!(files.service_unit, Path::new(SERVICE_UNIT));
    assert_eq!(files.config, Path::new(EXPORTER_CONFIG));
}
