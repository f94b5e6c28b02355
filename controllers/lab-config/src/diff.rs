//! Unified diffs for control-plane objects and host files

use crate::error::LabConfigError;
use serde::Serialize;
use serde_yaml::Value;
use similar::TextDiff;

/// Metadata fields owned by the API server
const SERVER_MANAGED_METADATA: &[&str] = &[
    "resourceVersion",
    "generation",
    "uid",
    "creationTimestamp",
    "deletionTimestamp",
    "managedFields",
];

/// Line diff of `old` against `new` with `-`/`+` headers; empty when equal
pub fn unified_diff(old: &str, new: &str, old_header: &str, new_header: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(old_header, new_header)
        .to_string()
}

/// Serialize an object to YAML without server-managed metadata and status
fn normalized_yaml<T: Serialize>(kind: &'static str, name: &str, object: &T) -> Result<String, LabConfigError> {
    let to_error = |source| LabConfigError::Serialize {
        kind,
        name: name.to_string(),
        source,
    };
    let mut value = serde_yaml::to_value(object).map_err(to_error)?;
    if let Some(root) = value.as_mapping_mut() {
        root.remove("status");
        if let Some(metadata) = root.get_mut("metadata").and_then(Value::as_mapping_mut) {
            for field in SERVER_MANAGED_METADATA {
                metadata.remove(*field);
            }
        }
    }
    serde_yaml::to_string(&value).map_err(to_error)
}

/// Diff two versions of an object, ignoring server-managed metadata and status
///
/// Returns `None` when nothing else differs.
pub fn object_diff<T: Serialize>(
    kind: &'static str,
    name: &str,
    live: &T,
    desired: &T,
) -> Result<Option<String>, LabConfigError> {
    let live = normalized_yaml(kind, name, live)?;
    let desired = normalized_yaml(kind, name, desired)?;
    if live == desired {
        return Ok(None);
    }
    Ok(Some(unified_diff(&live, &desired, "live", "desired")))
}
