//! Variable store
//!
//! Flat `name: value` YAML files merged into a single namespace. Values stay in
//! their raw (possibly encrypted) form and are decrypted on every read.

use crate::error::{VarsError, VaultError};
use crate::vault::{is_vault_encrypted, VaultDecryptor};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Origin recorded for variables inserted programmatically
const INLINE_ORIGIN: &str = "<inline>";

/// Name → value store loaded once per run
#[derive(Debug, Default)]
pub struct VariableStore {
    values: BTreeMap<String, Value>,
    origins: BTreeMap<String, PathBuf>,
    decryptor: Option<VaultDecryptor>,
}

impl VariableStore {
    /// Create an empty store with an optional vault decryptor
    pub fn new(decryptor: Option<VaultDecryptor>) -> Self {
        Self {
            decryptor,
            ..Self::default()
        }
    }

    /// Create an empty store, resolving the vault password from the explicit
    /// file or the environment
    pub fn from_env(password_file: Option<&Path>) -> Result<Self, VaultError> {
        Ok(Self::new(VaultDecryptor::discover(password_file)?))
    }

    /// Load a variables file into the store
    ///
    /// Fails with [`VarsError::DuplicateVariable`] if any key is already present.
    pub fn load(&mut self, path: &Path) -> Result<(), VarsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| VarsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Value = serde_yaml::from_str(&contents).map_err(|source| VarsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mapping = match document {
            Value::Null => return Ok(()),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(VarsError::InvalidFormat {
                    path: path.to_path_buf(),
                    reason: format!("expected a mapping at top level, found {}", type_name(&other)),
                });
            }
        };

        for (key, value) in mapping {
            let Value::String(key) = key else {
                return Err(VarsError::InvalidFormat {
                    path: path.to_path_buf(),
                    reason: format!("variable names must be strings, found {}", type_name(&key)),
                });
            };
            self.insert_from(key, value, path)?;
        }
        debug!(path = %path.display(), count = self.values.len(), "Loaded variables");
        Ok(())
    }

    /// Insert a single variable
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), VarsError> {
        self.insert_from(key.into(), value.into(), Path::new(INLINE_ORIGIN))
    }

    fn insert_from(&mut self, key: String, value: Value, origin: &Path) -> Result<(), VarsError> {
        if let Some(original) = self.origins.get(&key) {
            return Err(VarsError::DuplicateVariable {
                key,
                path: origin.to_path_buf(),
                original: original.clone(),
            });
        }
        self.origins.insert(key.clone(), origin.to_path_buf());
        self.values.insert(key, value);
        Ok(())
    }

    /// Whether the variable exists
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All variable names, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Whether the raw stored value is vault encrypted
    pub fn is_vault_encrypted(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(Value::String(s)) => is_vault_encrypted(s),
            Some(Value::Tagged(tagged)) => {
                tagged.tag == "vault" && matches!(&tagged.value, Value::String(_))
            }
            _ => false,
        }
    }

    /// Return the value of a variable, decrypting it if necessary
    pub fn get(&self, key: &str) -> Result<String, VarsError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| VarsError::NotFound(key.to_string()))?;

        match value {
            Value::String(s) if is_vault_encrypted(s) => self.decrypt(key, s),
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Tagged(tagged) if tagged.tag == "vault" => match &tagged.value {
                Value::String(s) => self.decrypt(key, s),
                _ => Err(VarsError::NotScalar(key.to_string())),
            },
            _ => Err(VarsError::NotScalar(key.to_string())),
        }
    }

    fn decrypt(&self, key: &str, data: &str) -> Result<String, VarsError> {
        let decryptor = self
            .decryptor
            .as_ref()
            .ok_or_else(|| VarsError::MissingDecryptionKey(key.to_string()))?;
        decryptor.decrypt(data).map_err(|source| VarsError::Vault {
            key: key.to_string(),
            source,
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_vars(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_and_get_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vars(&dir, "vars.yaml", "region: eu-west\nport: 2222\nenabled: true\n");

        let mut store = VariableStore::new(None);
        store.load(&path).unwrap();

        assert_eq!(store.get("region").unwrap(), "eu-west");
        assert_eq!(store.get("port").unwrap(), "2222");
        assert_eq!(store.get("enabled").unwrap(), "true");
        assert!(store.has("region"));
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["enabled", "port", "region"]);
    }

    #[test]
    fn test_duplicate_across_files_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_vars(&dir, "a.yaml", "token: one\n");
        let second = write_vars(&dir, "b.yaml", "token: two\n");

        let mut store = VariableStore::new(None);
        store.load(&first).unwrap();
        let err = store.load(&second).unwrap_err();

        match err {
            VarsError::DuplicateVariable { key, original, .. } => {
                assert_eq!(key, "token");
                assert_eq!(original, first);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.get("token").unwrap(), "one");
    }

    #[test]
    fn test_missing_and_non_scalar() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vars(&dir, "vars.yaml", "list:\n  - a\n  - b\n");

        let mut store = VariableStore::new(None);
        store.load(&path).unwrap();

        assert!(matches!(store.get("nope"), Err(VarsError::NotFound(_))));
        assert!(matches!(store.get("list"), Err(VarsError::NotScalar(_))));
    }

    #[test]
    fn test_empty_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vars(&dir, "empty.yaml", "");
        let mut store = VariableStore::new(None);
        store.load(&path).unwrap();
        assert_eq!(store.keys().count(), 0);
    }

    #[test]
    fn test_top_level_sequence_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vars(&dir, "bad.yaml", "- a\n- b\n");
        let mut store = VariableStore::new(None);
        assert!(matches!(store.load(&path), Err(VarsError::InvalidFormat { .. })));
    }

    #[test]
    fn test_encrypted_value_is_decrypted_on_read() {
        let decryptor = VaultDecryptor::new("lab-password").unwrap();
        let encrypted = decryptor.encrypt("ssh-pass", b"fixed-salt").unwrap();

        let mut store = VariableStore::new(Some(decryptor));
        store.insert("ssh_password", encrypted).unwrap();

        assert!(store.is_vault_encrypted("ssh_password"));
        assert_eq!(store.get("ssh_password").unwrap(), "ssh-pass");
    }

    #[test]
    fn test_vault_tagged_value_from_file() {
        let decryptor = VaultDecryptor::new("lab-password").unwrap();
        let encrypted = decryptor.encrypt("tagged-secret", b"salt").unwrap();
        let indented: String = encrypted
            .lines()
            .map(|line| format!("  {line}\n"))
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = write_vars(&dir, "vault.yaml", &format!("api_token: !vault |\n{indented}"));

        let mut store = VariableStore::new(Some(decryptor));
        store.load(&path).unwrap();

        assert!(store.is_vault_encrypted("api_token"));
        assert_eq!(store.get("api_token").unwrap(), "tagged-secret");
    }

    #[test]
    fn test_encrypted_value_without_password() {
        let encrypted = VaultDecryptor::new("pw")
            .unwrap()
            .encrypt("secret", b"salt")
            .unwrap();
        let mut store = VariableStore::new(None);
        store.insert("secret", encrypted).unwrap();

        assert!(matches!(
            store.get("secret"),
            Err(VarsError::MissingDecryptionKey(key)) if key == "secret"
        ));
    }

    #[test]
    fn test_wrong_password_surfaces_decryption_failure() {
        let encrypted = VaultDecryptor::new("right")
            .unwrap()
            .encrypt("secret", b"salt")
            .unwrap();
        let mut store = VariableStore::new(Some(VaultDecryptor::new("wrong").unwrap()));
        store.insert("secret", encrypted).unwrap();

        assert!(matches!(
            store.get("secret"),
            Err(VarsError::Vault {
                source: VaultError::DecryptionFailed,
                ..
            })
        ));
    }

    #[test]
    fn test_plain_value_is_not_encrypted() {
        let mut store = VariableStore::new(None);
        store.insert("plain", "value").unwrap();
        store.insert("number", 42).unwrap();
        assert!(!store.is_vault_encrypted("plain"));
        assert!(!store.is_vault_encrypted("number"));
        assert!(!store.is_vault_encrypted("missing"));
    }
}
