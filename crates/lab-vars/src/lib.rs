//! Lab variables
//!
//! Loads the `variables:` files referenced by a lab configuration and serves
//! them to the template engine. Values encrypted with Ansible Vault are
//! decrypted transparently on read.
//!
//! # Example
//!
//! ```no_run
//! use lab_vars::{VariableStore, VaultDecryptor};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let decryptor = VaultDecryptor::discover(None)?;
//! let mut store = VariableStore::new(decryptor);
//! store.load(Path::new("vars/lab.yaml"))?;
//! let password = store.get("ssh_password")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod store;
pub mod vault;

pub use error::{VarsError, VaultError};
pub use store::VariableStore;
pub use vault::{is_vault_encrypted, VaultDecryptor};
