//! Scoped parameter sets for `$(params.x)` and metadata placeholders

use std::collections::BTreeMap;
use tracing::warn;

/// Key/value bag tagged with the scope it came from
///
/// The scope only feeds diagnostics: overwrites during [`ParameterSet::merge`]
/// are logged with it, and merged sets carry `merged-<left>-<right>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    scope: String,
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    /// Create an empty set for the given scope
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            values: BTreeMap::new(),
        }
    }

    /// Create a set from existing key/value pairs
    pub fn from_map<I, K, V>(scope: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut set = Self::new(scope);
        set.set_from_map(values);
        set
    }

    /// Scope tag
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set a value, silently replacing any previous one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Set many values, warning on each overwrite
    pub fn set_from_map<I, K, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in values {
            let key = key.into();
            if self.values.contains_key(&key) {
                warn!(parameter = %key, scope = %self.scope, "Overwriting existing parameter");
            }
            self.values.insert(key, value.into());
        }
    }

    /// Right-biased merge: values from `other` win
    #[must_use]
    pub fn merge(&self, other: &ParameterSet) -> ParameterSet {
        let mut merged = ParameterSet::new(format!("merged-{}-{}", self.scope, other.scope));
        merged.set_from_map(self.iter());
        merged.set_from_map(other.iter());
        merged
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
