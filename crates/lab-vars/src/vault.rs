//! Ansible Vault 1.1 / 1.2 (AES256) decryption
//!
//! Payload layout after the header line:
//! `hex( hex(salt) \n hex(hmac) \n hex(ciphertext) )`, wrapped at 80 columns.
//! Keys are derived with PBKDF2-HMAC-SHA256 (10 000 rounds, 80 bytes) and split
//! into the AES-256 key, the HMAC-SHA256 key and the CTR initial counter block.

use crate::error::VaultError;
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Prefix that marks a string value as vault encrypted
pub const VAULT_HEADER_PREFIX: &str = "$ANSIBLE_VAULT;";

/// Environment variable naming a file that holds the vault password
pub const VAULT_PASSWORD_FILE_ENV: &str = "ANSIBLE_VAULT_PASSWORD_FILE";

/// Environment variable holding the vault password itself
pub const VAULT_PASSWORD_ENV: &str = "ANSIBLE_VAULT_PASSWORD";

const PBKDF2_ITERATIONS: u32 = 10_000;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const WRAP_COLUMNS: usize = 80;

/// Returns true if the value carries a vault header
pub fn is_vault_encrypted(value: &str) -> bool {
    value.trim_start().starts_with(VAULT_HEADER_PREFIX)
}

struct DerivedKeys {
    cipher_key: Zeroizing<[u8; KEY_LEN]>,
    hmac_key: Zeroizing<[u8; KEY_LEN]>,
    iv: [u8; IV_LEN],
}

/// Decrypts (and, for fixtures, encrypts) vault payloads with a single password
#[derive(Clone)]
pub struct VaultDecryptor {
    password: Zeroizing<String>,
}

impl fmt::Debug for VaultDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultDecryptor")
            .field("password", &"<redacted>")
            .finish()
    }
}

impl VaultDecryptor {
    /// Create a decryptor; surrounding whitespace, CR, LF and TAB are stripped
    pub fn new(password: &str) -> Result<Self, VaultError> {
        let cleaned: String = password
            .trim()
            .chars()
            .filter(|c| !matches!(c, '\n' | '\r' | '\t'))
            .collect();
        if cleaned.is_empty() {
            return Err(VaultError::EmptyPassword);
        }
        Ok(Self {
            password: Zeroizing::new(cleaned),
        })
    }

    /// Create a decryptor from a password file
    pub fn from_file(path: &Path) -> Result<Self, VaultError> {
        let contents = Zeroizing::new(std::fs::read_to_string(path).map_err(|source| {
            VaultError::PasswordFile {
                path: path.to_path_buf(),
                source,
            }
        })?);
        Self::new(&contents)
    }

    /// Resolve the vault password from the process environment.
    ///
    /// Order: explicit file, `ANSIBLE_VAULT_PASSWORD_FILE`, `ANSIBLE_VAULT_PASSWORD`.
    /// Returns `Ok(None)` when no source is configured.
    pub fn discover(password_file: Option<&Path>) -> Result<Option<Self>, VaultError> {
        Self::discover_with(password_file, |name| std::env::var(name).ok())
    }

    /// Same as [`VaultDecryptor::discover`] with an injectable environment lookup
    pub fn discover_with<F>(password_file: Option<&Path>, env: F) -> Result<Option<Self>, VaultError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = password_file {
            return Self::from_file(path).map(Some);
        }
        if let Some(path) = env(VAULT_PASSWORD_FILE_ENV).filter(|p| !p.is_empty()) {
            return Self::from_file(Path::new(&path)).map(Some);
        }
        if let Some(password) = env(VAULT_PASSWORD_ENV).filter(|p| !p.is_empty()) {
            return Self::new(&password).map(Some);
        }
        Ok(None)
    }

    /// Decrypt a full vault document (header line plus hex body)
    pub fn decrypt(&self, data: &str) -> Result<String, VaultError> {
        let data = data.trim();
        let (header, body) = data
            .split_once('\n')
            .ok_or_else(|| VaultError::InvalidFormat("missing payload after header".to_string()))?;
        parse_header(header.trim())?;

        let body: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let inner = hex::decode(body)?;
        let inner = String::from_utf8(inner)
            .map_err(|_| VaultError::InvalidFormat("payload is not text".to_string()))?;

        let parts: Vec<&str> = inner.split('\n').map(str::trim).collect();
        let [salt, expected_mac, ciphertext] = parts.as_slice() else {
            return Err(VaultError::InvalidFormat(format!(
                "expected 3 payload sections, found {}",
                parts.len()
            )));
        };
        let salt = hex::decode(salt)?;
        let expected_mac = hex::decode(expected_mac)?;
        let mut buffer = hex::decode(ciphertext)?;

        let keys = self.derive_keys(&salt);

        let mut mac = <HmacSha256 as Mac>::new_from_slice(keys.hmac_key.as_slice())
            .map_err(|e| VaultError::InvalidFormat(e.to_string()))?;
        mac.update(&buffer);
        mac.verify_slice(&expected_mac)
            .map_err(|_| VaultError::DecryptionFailed)?;

        let mut cipher = Aes256Ctr::new_from_slices(keys.cipher_key.as_slice(), &keys.iv)
            .map_err(|e| VaultError::InvalidFormat(e.to_string()))?;
        cipher.apply_keystream(&mut buffer);
        let buffer = Zeroizing::new(buffer);

        let plaintext = unpad(&buffer)?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|_| VaultError::InvalidFormat("decrypted value is not UTF-8".to_string()))
    }

    /// Encrypt `plaintext` with the given salt into a vault 1.1 document
    pub fn encrypt(&self, plaintext: &str, salt: &[u8]) -> Result<String, VaultError> {
        let keys = self.derive_keys(salt);

        let mut buffer = pad(plaintext.as_bytes());
        let mut cipher = Aes256Ctr::new_from_slices(keys.cipher_key.as_slice(), &keys.iv)
            .map_err(|e| VaultError::InvalidFormat(e.to_string()))?;
        cipher.apply_keystream(&mut buffer);

        let mut mac = <HmacSha256 as Mac>::new_from_slice(keys.hmac_key.as_slice())
            .map_err(|e| VaultError::InvalidFormat(e.to_string()))?;
        mac.update(&buffer);
        let tag = mac.finalize().into_bytes();

        let inner = format!(
            "{}\n{}\n{}",
            hex::encode(salt),
            hex::encode(tag),
            hex::encode(&buffer)
        );
        let outer = hex::encode(inner.as_bytes());
        let lines: Vec<&str> = outer
            .as_bytes()
            .chunks(WRAP_COLUMNS)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect();
        Ok(format!("{VAULT_HEADER_PREFIX}1.1;AES256\n{}", lines.join("\n")))
    }

    fn derive_keys(&self, salt: &[u8]) -> DerivedKeys {
        let mut derived = Zeroizing::new([0u8; 2 * KEY_LEN + IV_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(
            self.password.as_bytes(),
            salt,
            PBKDF2_ITERATIONS,
            derived.as_mut_slice(),
        );

        let mut cipher_key = Zeroizing::new([0u8; KEY_LEN]);
        let mut hmac_key = Zeroizing::new([0u8; KEY_LEN]);
        let mut iv = [0u8; IV_LEN];
        cipher_key.copy_from_slice(&derived[..KEY_LEN]);
        hmac_key.copy_from_slice(&derived[KEY_LEN..2 * KEY_LEN]);
        iv.copy_from_slice(&derived[2 * KEY_LEN..]);
        DerivedKeys {
            cipher_key,
            hmac_key,
            iv,
        }
    }
}

fn parse_header(header: &str) -> Result<(), VaultError> {
    let fields: Vec<&str> = header.split(';').map(str::trim).collect();
    match fields.as_slice() {
        ["$ANSIBLE_VAULT", "1.1", "AES256"] | ["$ANSIBLE_VAULT", "1.2", "AES256", _] => Ok(()),
        ["$ANSIBLE_VAULT", version, cipher, ..] => Err(VaultError::InvalidFormat(format!(
            "unsupported vault version {version} with cipher {cipher}"
        ))),
        _ => Err(VaultError::InvalidFormat(format!("invalid header '{header}'"))),
    }
}

fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_LEN - data.len() % BLOCK_LEN;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    // pad_len is in 1..=16
    padded.resize(data.len() + pad_len, u8::try_from(pad_len).unwrap_or(16));
    padded
}

fn unpad(data: &[u8]) -> Result<&[u8], VaultError> {
    let &last = data.last().ok_or(VaultError::Unpad)?;
    let pad_len = usize::from(last);
    if pad_len == 0 || pad_len > BLOCK_LEN || pad_len > data.len() {
        return Err(VaultError::Unpad);
    }
    let (plain, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b != last) {
        return Err(VaultError::Unpad);
    }
    Ok(plain)
}
