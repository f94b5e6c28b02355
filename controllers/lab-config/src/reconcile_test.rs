//! Unit tests for the reconcile core

use super::*;
use std::sync::Mutex;

/// In-memory target storing name -> value strings
#[derive(Default)]
struct MemoryTarget {
    items: Mutex<BTreeMap<String, String>>,
    mutations: Mutex<Vec<String>>,
}

impl MemoryTarget {
    fn with(items: &[(&str, &str)]) -> Self {
        let target = Self::default();
        {
            let mut stored = target.items.lock().unwrap();
            for (name, value) in items {
                stored.insert((*name).to_string(), (*value).to_string());
            }
        }
        target
    }

    fn names(&self) -> Vec<String> {
        self.items.lock().unwrap().keys().cloned().collect()
    }

    fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SyncTarget for MemoryTarget {
    type Desired = String;
    type Live = (String, String);

    fn scope(&self) -> &str {
        "memory"
    }

    fn kind(&self) -> &'static str {
        "item"
    }

    fn live_name(&self, live: &Self::Live) -> String {
        live.0.clone()
    }

    async fn list(&self) -> Result<Vec<Self::Live>, LabConfigError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn diff(&self, live: &Self::Live, desired: &Self::Desired) -> Result<Option<String>, LabConfigError> {
        Ok((live.1 != *desired).then(|| format!("-{}\n+{}", live.1, desired)))
    }

    async fn create(&self, name: &str, desired: &Self::Desired) -> Result<(), LabConfigError> {
        self.mutations.lock().unwrap().push(format!("create {name}"));
        self.items.lock().unwrap().insert(name.to_string(), desired.clone());
        Ok(())
    }

    async fn update(&self, name: &str, _live: &Self::Live, desired: &Self::Desired) -> Result<(), LabConfigError> {
        self.mutations.lock().unwrap().push(format!("update {name}"));
        self.items.lock().unwrap().insert(name.to_string(), desired.clone());
        Ok(())
    }

    async fn delete(&self, name: &str, _live: &Self::Live) -> Result<(), LabConfigError> {
        self.mutations.lock().unwrap().push(format!("delete {name}"));
        self.items.lock().unwrap().remove(name);
        Ok(())
    }
}

fn desired(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

const PRUNE: SyncOptions = SyncOptions {
    dry_run: false,
    prune: true,
};

#[tokio::test]
async fn test_creates_deletes_and_keeps() {
    let target = MemoryTarget::with(&[("b", "1"), ("c", "1")]);
    let report = reconcile(&target, &desired(&[("a", "1"), ("b", "1")]), None, PRUNE)
        .await
        .unwrap();

    assert_eq!(report.created, vec!["a"]);
    assert_eq!(report.deleted, vec!["c"]);
    assert!(report.updated.is_empty());
    assert_eq!(report.unchanged, vec!["b"]);
    assert_eq!(target.names(), vec!["a", "b"]);
    // Deletes run before creates
    assert_eq!(target.mutations(), vec!["delete c", "create a"]);
}

#[tokio::test]
async fn test_updates_only_when_diff_present() {
    let target = MemoryTarget::with(&[("a", "old"), ("b", "same")]);
    let report = reconcile(&target, &desired(&[("a", "new"), ("b", "same")]), None, PRUNE)
        .await
        .unwrap();

    assert_eq!(report.updated, vec!["a"]);
    assert_eq!(report.unchanged, vec!["b"]);
    assert!(report.changed("a"));
    assert!(!report.changed("b"));
    assert_eq!(target.mutations(), vec!["update a"]);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let target = MemoryTarget::with(&[("b", "1"), ("c", "1")]);
    let wanted = desired(&[("a", "1"), ("b", "2")]);
    reconcile(&target, &wanted, None, PRUNE).await.unwrap();

    let second = reconcile(&target, &wanted, None, PRUNE).await.unwrap();
    assert!(!second.has_changes());
    assert_eq!(second.unchanged, vec!["a", "b"]);
}

#[tokio::test]
async fn test_dry_run_reports_without_mutating() {
    let target = MemoryTarget::with(&[("b", "1"), ("c", "1")]);
    let options = SyncOptions {
        dry_run: true,
        prune: true,
    };
    let report = reconcile(&target, &desired(&[("a", "1"), ("b", "2")]), None, options)
        .await
        .unwrap();

    assert_eq!(report.created, vec!["a"]);
    assert_eq!(report.updated, vec!["b"]);
    assert_eq!(report.deleted, vec!["c"]);
    assert!(target.mutations().is_empty());
    assert_eq!(target.names(), vec!["b", "c"]);
}

#[tokio::test]
async fn test_without_prune_extra_items_are_kept() {
    let target = MemoryTarget::with(&[("a", "1"), ("stale", "1")]);
    let report = reconcile(&target, &desired(&[("a", "1")]), None, SyncOptions::default())
        .await
        .unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(report.prune_skipped, vec!["stale"]);
    assert_eq!(target.names(), vec!["a", "stale"]);
}

#[tokio::test]
async fn test_filter_limits_both_sides() {
    let target = MemoryTarget::with(&[("lab-old", "1"), ("other", "1")]);
    let filter = NameFilter::new("item", "^lab-").unwrap();
    let report = reconcile(
        &target,
        &desired(&[("lab-new", "1"), ("skipped", "1")]),
        Some(&filter),
        PRUNE,
    )
    .await
    .unwrap();

    assert_eq!(report.created, vec!["lab-new"]);
    assert_eq!(report.deleted, vec!["lab-old"]);
    assert_eq!(target.names(), vec!["lab-new", "other"]);
}

#[test]
fn test_invalid_filter_is_an_error() {
    let err = NameFilter::new("client", "([").unwrap_err();
    assert!(matches!(err, LabConfigError::InvalidFilter { what: "client", .. }));
}

#[test]
fn test_empty_filter_means_no_filter() {
    assert!(NameFilter::optional("client", Some("")).unwrap().is_none());
    assert!(NameFilter::optional("client", None).unwrap().is_none());
    let filter = NameFilter::optional("client", Some("ci")).unwrap();
    assert!(passes(filter.as_ref(), "ci-bot"));
    assert!(!passes(filter.as_ref(), "alice"));
    assert!(passes(None, "anything"));
}
