//! Template rendering errors

use lab_vars::VarsError;
use thiserror::Error;

/// Errors that can occur while rendering placeholders
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A referenced variable exists but could not be read (e.g. vault failure)
    #[error("error retrieving variable '{key}': {source}")]
    Variable {
        key: String,
        #[source]
        source: VarsError,
    },

    /// Substitution kept producing new placeholders
    #[error(
        "recursion limit reached while applying replacements, \
         check for circular references, like: {key} => {value}"
    )]
    RecursionLimitExceeded { key: String, value: String },

    /// Placeholders remained after substitution
    #[error("unresolved placeholders: {}", keys.join(", "))]
    UnresolvedPlaceholder { keys: Vec<String> },

    /// Error located inside a field of a rendered object
    #[error("in field {path}: {source}")]
    Field {
        path: String,
        #[source]
        source: Box<TemplateError>,
    },
}

impl TemplateError {
    /// Prefix the error location with a field name or `[index]` segment
    #[must_use]
    pub fn in_field(self, segment: &str) -> Self {
        match self {
            TemplateError::Field { path, source } => {
                let path = if path.starts_with('[') {
                    format!("{segment}{path}")
                } else {
                    format!("{segment}.{path}")
                };
                TemplateError::Field { path, source }
            }
            other => TemplateError::Field {
                path: segment.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, skipping field location wrappers
    pub fn root_cause(&self) -> &TemplateError {
        match self {
            TemplateError::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
