//! Variable store and vault errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decrypting an Ansible Vault payload
#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault password is empty after trimming whitespace
    #[error("vault password is empty")]
    EmptyPassword,

    /// The vault password file could not be read
    #[error("failed to read vault password file {path}: {source}")]
    PasswordFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header or payload layout is not a supported vault format
    #[error("invalid vault format: {0}")]
    InvalidFormat(String),

    /// A payload section is not valid hex
    #[error("invalid hex in vault payload: {0}")]
    Hex(#[from] hex::FromHexError),

    /// HMAC verification failed (wrong password or tampered ciphertext)
    #[error("decryption failed: HMAC verification failed")]
    DecryptionFailed,

    /// Plaintext padding is malformed
    #[error("decryption failed: invalid padding")]
    Unpad,
}

/// Errors raised by the variable store
#[derive(Debug, Error)]
pub enum VarsError {
    /// Variable file could not be read
    #[error("failed to read variables file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Variable file is not valid YAML
    #[error("failed to parse variables file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Variable file is YAML but not a flat mapping of names to values
    #[error("invalid variables file {path}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    /// The same variable name is defined twice
    #[error("duplicate variable '{key}' in {path} (already defined in {original})")]
    DuplicateVariable {
        key: String,
        path: PathBuf,
        original: PathBuf,
    },

    /// Variable does not exist
    #[error("variable '{0}' not found")]
    NotFound(String),

    /// Variable exists but is a sequence or mapping
    #[error("variable '{0}' is not a scalar value")]
    NotScalar(String),

    /// Variable is vault-encrypted but no vault password was configured
    #[error(
        "variable '{0}' is vault encrypted but no vault password was provided \
         (use --vault-password-file, ANSIBLE_VAULT_PASSWORD_FILE or ANSIBLE_VAULT_PASSWORD)"
    )]
    MissingDecryptionKey(String),

    /// Vault decryption of a variable failed
    #[error("failed to decrypt variable '{key}': {source}")]
    Vault {
        key: String,
        #[source]
        source: VaultError,
    },
}
