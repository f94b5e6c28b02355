//! Object references shared by lab-config and Jumpstarter resources

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to another object by name, resolved within the loaded config
/// (lab-config kinds) or the same namespace (Jumpstarter kinds)
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalReference {
    /// Name of the referenced object
    #[serde(default)]
    pub name: String,
}

impl LocalReference {
    /// Create a reference to `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Whether the reference names anything
    pub fn is_set(&self) -> bool {
        !self.name.is_empty()
    }
}

templating::templatable!(LocalReference { name });
