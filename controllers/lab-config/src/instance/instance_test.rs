//! Unit tests for control-plane sync

use super::*;
use crate::error::LabConfigError;
use crate::reconcile::NameFilter;
use crate::test_utils::{client, exporter_instance, jumpstarter_instance, lab_config, lab_variables};
use crds::{Exporter, ExporterSpec, ExporterStatus, LocalReference};
use jumpstarter_client::MockControlPlaneClient;
use std::time::Duration;

const NAMESPACE: &str = "jumpstarter-lab";

const APPLY: SyncOptions = SyncOptions {
    dry_run: false,
    prune: true,
};

fn instance(mock: &MockControlPlaneClient, options: SyncOptions) -> Instance {
    Instance::new(jumpstarter_instance("prod", NAMESPACE), Arc::new(mock.clone()), options)
}

fn live_client(name: &str, username: &str) -> crds::Client {
    let mut object = client(name);
    object.spec.username = Some(username.to_string());
    object.metadata.namespace = Some(NAMESPACE.to_string());
    object
}

fn live_exporter(name: &str, credential: Option<&str>) -> Exporter {
    let mut object = Exporter::new(
        name,
        ExporterSpec {
            username: Some(format!("lab:{name}")),
        },
    );
    object.metadata.namespace = Some(NAMESPACE.to_string());
    object.status = credential.map(|secret| ExporterStatus {
        credential: Some(LocalReference::new(secret)),
        ..ExporterStatus::default()
    });
    object
}

#[test]
fn test_prepare_metadata_merges_annotations() {
    let mock = MockControlPlaneClient::new();
    let instance = instance(&mock, APPLY);
    let mut metadata = ObjectMeta {
        annotations: Some(BTreeMap::from([("owner".to_string(), "ci".to_string())])),
        ..ObjectMeta::default()
    };
    let desired = BTreeMap::from([("team".to_string(), "platform".to_string())]);

    instance.prepare_metadata(&mut metadata, Some(&desired));

    let annotations = metadata.annotations.unwrap();
    assert_eq!(annotations["owner"], "ci");
    assert_eq!(annotations["team"], "platform");
    assert_eq!(annotations[MANAGED_BY_ANNOTATION], MANAGED_BY_VALUE);
    assert_eq!(metadata.namespace.as_deref(), Some(NAMESPACE));
}

#[test]
fn test_prepare_metadata_keeps_explicit_namespace() {
    let mock = MockControlPlaneClient::new();
    let mut metadata = ObjectMeta {
        namespace: Some("other".to_string()),
        ..ObjectMeta::default()
    };
    instance(&mock, APPLY).prepare_metadata(&mut metadata, None);
    assert_eq!(metadata.namespace.as_deref(), Some("other"));
}

#[tokio::test]
async fn test_sync_clients_creates_updates_and_prunes() {
    let mock = MockControlPlaneClient::new();
    mock.add_client(live_client("alice", "sso:old"));
    mock.add_client(live_client("bob", "sso:bob"));
    let mut config = lab_config(lab_variables());
    config.clients.insert("carol".to_string(), client("carol"));

    let report = instance(&mock, APPLY).sync_clients(&config, None).await.unwrap();

    assert_eq!(report.deleted, vec!["bob"]);
    assert_eq!(report.created, vec!["carol"]);
    assert_eq!(report.updated, vec!["alice"]);
    assert_eq!(
        mock.mutations(),
        vec![
            "delete client jumpstarter-lab/bob",
            "create client jumpstarter-lab/carol",
            "update client jumpstarter-lab/alice",
        ]
    );

    let alice = mock.stored_client(NAMESPACE, "alice").unwrap();
    assert_eq!(alice.spec.username.as_deref(), Some("sso:alice"));
    assert_eq!(
        alice.metadata.annotations.unwrap()[MANAGED_BY_ANNOTATION],
        MANAGED_BY_VALUE
    );
}

#[tokio::test]
async fn test_sync_clients_second_run_is_idempotent() {
    let mock = MockControlPlaneClient::new();
    let config = lab_config(lab_variables());
    let instance = instance(&mock, APPLY);

    instance.sync_clients(&config, None).await.unwrap();
    let after_first = mock.mutations();
    let report = instance.sync_clients(&config, None).await.unwrap();

    assert!(!report.has_changes());
    assert_eq!(report.unchanged, vec!["alice"]);
    assert_eq!(mock.mutations(), after_first);
}

#[tokio::test]
async fn test_server_managed_metadata_is_not_a_change() {
    let mock = MockControlPlaneClient::new();
    let mut live = live_client("alice", "sso:alice");
    live.metadata.annotations = Some(BTreeMap::from([(
        MANAGED_BY_ANNOTATION.to_string(),
        MANAGED_BY_VALUE.to_string(),
    )]));
    live.metadata.uid = Some("7d1e".to_string());
    mock.add_client(live);

    let report = instance(&mock, APPLY)
        .sync_clients(&lab_config(lab_variables()), None)
        .await
        .unwrap();

    assert_eq!(report.unchanged, vec!["alice"]);
    assert!(mock.mutations().is_empty());
}

#[tokio::test]
async fn test_sync_clients_dry_run_does_not_mutate() {
    let mock = MockControlPlaneClient::new();
    mock.add_client(live_client("bob", "sso:bob"));
    let options = SyncOptions {
        dry_run: true,
        prune: true,
    };

    let report = instance(&mock, options)
        .sync_clients(&lab_config(lab_variables()), None)
        .await
        .unwrap();

    assert_eq!(report.created, vec!["alice"]);
    assert_eq!(report.deleted, vec!["bob"]);
    assert!(mock.mutations().is_empty());
}

#[tokio::test]
async fn test_sync_exporters_creates_and_collects_credentials() {
    let mock = MockControlPlaneClient::new();
    mock.issue_credentials_after(0);
    let config = lab_config(lab_variables());

    let parameters = instance(&mock, APPLY).sync_exporters(&config, None).await.unwrap();

    assert_eq!(mock.mutations(), vec!["create exporter jumpstarter-lab/dut-01"]);
    assert_eq!(parameters["dut-01"].token, "token-dut-01");
    assert_eq!(parameters["dut-01"].tls_ca, "");

    let stored = mock.stored_exporter(NAMESPACE, "dut-01").unwrap();
    assert_eq!(stored.spec.username.as_deref(), Some("lab:dut-01"));
    let labels = stored.metadata.labels.unwrap();
    assert_eq!(labels["board"], "rcar-s4");
    assert_eq!(labels["location"], "lab-a");
    assert_eq!(labels["team"], "platform");
}

#[tokio::test]
async fn test_existing_exporter_credentials_include_ca() {
    let mock = MockControlPlaneClient::new();
    let config = lab_config(lab_variables());
    let instance = instance(&mock, APPLY);
    let mut live = live_exporter("dut-01", Some("dut-01-exporter"));
    live.metadata.labels = instance.desired_exporters(&config).unwrap()["dut-01"]
        .metadata
        .labels
        .clone();
    live.metadata.annotations = Some(BTreeMap::from([(
        MANAGED_BY_ANNOTATION.to_string(),
        MANAGED_BY_VALUE.to_string(),
    )]));
    mock.add_exporter(live);
    mock.add_secret(NAMESPACE, "dut-01-exporter", &[("token", "tok"), ("ca.crt", "CA DATA")]);

    let parameters = instance.sync_exporters(&config, None).await.unwrap();

    assert!(mock.mutations().is_empty());
    assert_eq!(parameters["dut-01"].token, "tok");
    assert_eq!(parameters["dut-01"].tls_ca, "CA DATA");
}

#[tokio::test]
async fn test_secret_without_token_is_reported() {
    let mock = MockControlPlaneClient::new();
    mock.add_exporter(live_exporter("dut-01", Some("dut-01-exporter")));
    mock.add_secret(NAMESPACE, "dut-01-exporter", &[("ca.crt", "CA DATA")]);

    let err = instance(&mock, APPLY)
        .exporter_credentials(NAMESPACE, "dut-01")
        .await
        .unwrap_err();
    assert!(matches!(err, LabConfigError::MissingToken { ref secret } if secret == "dut-01-exporter"));
}

#[tokio::test(start_paused = true)]
async fn test_credential_wait_backs_off_until_issued() {
    let mock = MockControlPlaneClient::new();
    mock.issue_credentials_after(3);
    let config = lab_config(lab_variables());

    let start = tokio::time::Instant::now();
    let parameters = instance(&mock, APPLY).sync_exporters(&config, None).await.unwrap();

    assert_eq!(parameters["dut-01"].token, "token-dut-01");
    // Polled at 0s, 1s and 3s
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_credential_wait_times_out() {
    let mock = MockControlPlaneClient::new();
    let config = lab_config(lab_variables());

    let err = instance(&mock, APPLY).sync_exporters(&config, None).await.unwrap_err();

    match err {
        LabConfigError::CredentialTimeout { name, attempts, .. } => {
            assert_eq!(name, "dut-01");
            assert_eq!(attempts, 10);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_update_retries_on_conflict() {
    let mock = MockControlPlaneClient::new();
    mock.add_exporter(live_exporter("dut-01", Some("dut-01-exporter")));
    mock.add_secret(NAMESPACE, "dut-01-exporter", &[("token", "tok")]);
    mock.fail_next_updates_with_conflict(2);

    let start = tokio::time::Instant::now();
    instance(&mock, APPLY)
        .sync_exporters(&lab_config(lab_variables()), None)
        .await
        .unwrap();

    assert_eq!(mock.mutations(), vec!["update exporter jumpstarter-lab/dut-01"]);
    // 100ms + 200ms
    assert_eq!(start.elapsed(), Duration::from_millis(300));
    let stored = mock.stored_exporter(NAMESPACE, "dut-01").unwrap();
    assert_eq!(stored.metadata.labels.unwrap()["board"], "rcar-s4");
}

#[tokio::test(start_paused = true)]
async fn test_update_gives_up_after_repeated_conflicts() {
    let mock = MockControlPlaneClient::new();
    mock.add_exporter(live_exporter("dut-01", Some("dut-01-exporter")));
    mock.fail_next_updates_with_conflict(10);

    let err = instance(&mock, APPLY)
        .sync_exporters(&lab_config(lab_variables()), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LabConfigError::ConflictRetryExhausted { kind: "exporter", attempts: 10, .. }
    ));
    assert!(mock.mutations().is_empty());
}

#[tokio::test]
async fn test_dry_run_exporters_get_placeholder_token() {
    let mock = MockControlPlaneClient::new();
    let options = SyncOptions {
        dry_run: true,
        prune: false,
    };

    let parameters = instance(&mock, options)
        .sync_exporters(&lab_config(lab_variables()), None)
        .await
        .unwrap();

    assert_eq!(parameters["dut-01"].token, "dry-run");
    assert!(mock.mutations().is_empty());
}

#[tokio::test]
async fn test_exporters_of_other_instances_are_ignored() {
    let mock = MockControlPlaneClient::new();
    mock.issue_credentials_after(0);
    mock.add_exporter(live_exporter("legacy", None));
    let mut config = lab_config(lab_variables());
    config
        .exporter_instances
        .insert("dut-09".to_string(), exporter_instance("dut-09", "rpi-01", "staging"));
    let filter = NameFilter::new("exporter", "^dut-").unwrap();

    let parameters = instance(&mock, APPLY)
        .sync_exporters(&config, Some(&filter))
        .await
        .unwrap();

    assert_eq!(parameters.keys().collect::<Vec<_>>(), vec!["dut-01"]);
    // `legacy` is outside the filter and survives the prune
    assert!(mock.stored_exporter(NAMESPACE, "legacy").is_some());
    assert_eq!(mock.mutations(), vec!["create exporter jumpstarter-lab/dut-01"]);
}
