//! Generic desired-vs-live reconciliation
//!
//! [`reconcile`] drives any [`SyncTarget`] through the same three phases:
//! 1. delete live items missing from the desired set (only with `prune`),
//! 2. create desired items missing from the live set,
//! 3. update items present in both whose [`SyncTarget::diff`] is non-empty.
//!
//! An optional [`NameFilter`] restricts both sets before comparing. In dry-run
//! mode every read still happens and every action is reported, but no
//! mutating call reaches the target.

use crate::error::LabConfigError;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Dry-run and prune switches shared by every sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Report actions without performing them
    pub dry_run: bool,
    /// Delete live items that are no longer desired
    pub prune: bool,
}

/// Regular expression restricting which names a sync touches
#[derive(Debug, Clone)]
pub struct NameFilter(Regex);

impl NameFilter {
    /// Compile a filter; `what` names the filtered kind in errors
    pub fn new(what: &'static str, pattern: &str) -> Result<Self, LabConfigError> {
        Regex::new(pattern)
            .map(NameFilter)
            .map_err(|source| LabConfigError::InvalidFilter {
                what,
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Compile a filter if a pattern was given; an empty pattern means no filter
    pub fn optional(what: &'static str, pattern: Option<&str>) -> Result<Option<Self>, LabConfigError> {
        pattern.filter(|p| !p.is_empty()).map(|p| Self::new(what, p)).transpose()
    }

    /// Whether `name` passes the filter
    pub fn matches(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

/// Whether `name` passes an optional filter
pub fn passes(filter: Option<&NameFilter>, name: &str) -> bool {
    filter.is_none_or(|f| f.matches(name))
}

/// Backend a collection of named items is reconciled against
#[async_trait::async_trait]
pub trait SyncTarget: Send + Sync {
    /// Desired item type
    type Desired: Send + Sync;
    /// Live item type
    type Live: Send + Sync;

    /// Label for log lines (instance or host name)
    fn scope(&self) -> &str;

    /// Kind of item, for logs and reports
    fn kind(&self) -> &'static str;

    /// Name of a live item
    fn live_name(&self, live: &Self::Live) -> String;

    /// Fetch all live items
    async fn list(&self) -> Result<Vec<Self::Live>, LabConfigError>;

    /// Printable difference, or `None` when the live item already matches
    fn diff(&self, live: &Self::Live, desired: &Self::Desired) -> Result<Option<String>, LabConfigError>;

    /// Create a desired item
    async fn create(&self, name: &str, desired: &Self::Desired) -> Result<(), LabConfigError>;

    /// Bring a live item in line with the desired one
    async fn update(&self, name: &str, live: &Self::Live, desired: &Self::Desired) -> Result<(), LabConfigError>;

    /// Delete a live item
    async fn delete(&self, name: &str, live: &Self::Live) -> Result<(), LabConfigError>;
}

/// Outcome of one reconcile pass
///
/// In dry-run mode the created/updated/deleted lists hold what would have
/// been done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Kind of the synced items, as given by [`SyncTarget::kind`]
    pub kind: &'static str,
    /// Desired items that did not exist
    pub created: Vec<String>,
    /// Existing items whose content differed
    pub updated: Vec<String>,
    /// Live items removed because they are no longer desired
    pub deleted: Vec<String>,
    /// Items already matching the desired state
    pub unchanged: Vec<String>,
    /// Live items not in the desired set, kept because pruning is off
    pub prune_skipped: Vec<String>,
}

impl SyncReport {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Whether anything was (or would be) created, updated or deleted
    pub fn has_changes(&self) -> bool {
        !(self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty())
    }

    /// Whether `name` was (or would be) created, updated or deleted
    pub fn changed(&self, name: &str) -> bool {
        [&self.created, &self.updated, &self.deleted]
            .into_iter()
            .any(|names| names.iter().any(|n| n == name))
    }
}

/// Reconcile `desired` against the live items of `target`
pub async fn reconcile<T>(
    target: &T,
    desired: &BTreeMap<String, T::Desired>,
    filter: Option<&NameFilter>,
    options: SyncOptions,
) -> Result<SyncReport, LabConfigError>
where
    T: SyncTarget + ?Sized,
{
    let scope = target.scope();
    let kind = target.kind();
    let mut report = SyncReport::new(kind);

    let live: BTreeMap<String, T::Live> = target
        .list()
        .await?
        .into_iter()
        .map(|item| (target.live_name(&item), item))
        .filter(|(name, _)| passes(filter, name))
        .collect();
    let desired: BTreeMap<&String, &T::Desired> = desired.iter().filter(|(name, _)| passes(filter, name)).collect();
    debug!(scope, kind, live = live.len(), desired = desired.len(), "Reconciling");

    // Delete phase
    for (name, item) in &live {
        if desired.contains_key(name) {
            continue;
        }
        if !options.prune {
            info!(scope, kind, name = %name, "Not in configuration, skipping delete (prune disabled)");
            report.prune_skipped.push(name.clone());
            continue;
        }
        if options.dry_run {
            info!(scope, kind, name = %name, "dry run: Would delete");
        } else {
            info!(scope, kind, name = %name, "Deleting");
            target.delete(name, item).await?;
        }
        report.deleted.push(name.clone());
    }

    // Create phase
    for (name, item) in &desired {
        if live.contains_key(*name) {
            continue;
        }
        if options.dry_run {
            info!(scope, kind, name = %name, "dry run: Would create");
        } else {
            info!(scope, kind, name = %name, "Creating");
            target.create(name, item).await?;
        }
        report.created.push((*name).clone());
    }

    // Update phase
    for (name, item) in &live {
        let Some(wanted) = desired.get(name) else {
            continue;
        };
        match target.diff(item, wanted)? {
            None => {
                debug!(scope, kind, name = %name, "No changes needed");
                report.unchanged.push(name.clone());
            }
            Some(diff) => {
                if options.dry_run {
                    info!(scope, kind, name = %name, "dry run: Would update, diff:\n{}", diff);
                } else {
                    info!(scope, kind, name = %name, "Updating, diff:\n{}", diff);
                    target.update(name, item, wanted).await?;
                }
                report.updated.push(name.clone());
            }
        }
    }

    info!(
        scope,
        kind,
        created = report.created.len(),
        updated = report.updated.len(),
        deleted = report.deleted.len(),
        unchanged = report.unchanged.len(),
        prune_skipped = report.prune_skipped.len(),
        dry_run = options.dry_run,
        "Reconciled"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
