//! Encrypted at-rest storage for wallet and proxy records
//!
//! A vault is a single authenticated-encrypted JSON blob holding a map of
//! records, paired with a plaintext salt file. Every read decrypts the whole
//! map; every write re-encrypts and atomically replaces the file.

pub mod crypto;
pub mod proxy;
pub mod selection;
pub mod wallet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

pub use proxy::ProxyVault;
pub use wallet::WalletVault;

/// Generic encrypted key-value store.
///
/// The whole record map is one ciphertext blob; there is no per-record
/// encryption. Writers must hold the internal lock for the full
/// load-mutate-save cycle, otherwise concurrent updates would be lost
/// (last writer wins).
pub struct SecretVault<T> {
    vault_path: PathBuf,
    key: [u8; 32],
    lock: Mutex<()>,
    _record: PhantomData<T>,
}

impl<T> SecretVault<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open a vault, creating the salt file on first use.
    ///
    /// Key derivation runs once here and the derived key is held in memory
    /// for the process lifetime. It is never persisted.
    pub fn open(vault_path: &Path, salt_path: &Path, password: &str) -> Result<Self> {
        let salt = crypto::load_or_create_salt(salt_path)?;
        let key = crypto::derive_key(password, &salt);

        Ok(Self {
            vault_path: vault_path.to_path_buf(),
            key,
            lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    /// Decrypt and deserialize the full record map.
    ///
    /// A missing vault file is an empty map, not an error. A failed
    /// decryption surfaces as `WrongPassword` - silently treating it as an
    /// empty vault would let a typo look like data loss.
    pub fn load(&self) -> Result<BTreeMap<String, T>> {
        if !self.vault_path.exists() {
            return Ok(BTreeMap::new());
        }

        let blob = std::fs::read(&self.vault_path)?;
        let plaintext = crypto::open(&self.key, &blob)?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| Error::Vault(format!("vault decrypted but did not parse: {e}")))
    }

    /// Serialize, encrypt and atomically replace the vault file.
    ///
    /// Write-temp-then-rename so a crash never leaves a half-written
    /// ciphertext behind.
    pub fn save(&self, records: &BTreeMap<String, T>) -> Result<()> {
        let plaintext = serde_json::to_vec(records)?;
        let blob = crypto::seal(&self.key, &plaintext)?;

        let tmp_path = self.vault_path.with_extension("tmp");
        std::fs::write(&tmp_path, &blob)?;
        std::fs::rename(&tmp_path, &self.vault_path)?;
        Ok(())
    }

    /// Run a load-mutate-save cycle as one scoped critical section.
    ///
    /// The map is only persisted if the mutation closure succeeds.
    pub fn update<R>(
        &self,
        mutate: impl FnOnce(&mut BTreeMap<String, T>) -> Result<R>,
    ) -> Result<R> {
        let _guard = self.lock.lock().map_err(|_| {
            Error::Vault("vault lock poisoned by a previous panic".to_string())
        })?;

        let mut records = self.load()?;
        let out = mutate(&mut records)?;
        self.save(&records)?;
        Ok(out)
    }
}

/// Outcome of a batch operation: per-item failures never abort the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.failed += 1;
        self.errors.push(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        body: String,
    }

    fn vault_in(dir: &Path, password: &str) -> SecretVault<Note> {
        SecretVault::open(&dir.join("data.enc"), &dir.join("salt.key"), password).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_map() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path(), "pw");
        assert!(vault.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path(), "pw");

        let mut records = BTreeMap::new();
        records.insert(
            "Wallet_1".to_string(),
            Note {
                body: "alpha".to_string(),
            },
        );
        records.insert(
            "Wallet_2".to_string(),
            Note {
                body: "beta".to_string(),
            },
        );
        vault.save(&records).unwrap();

        assert_eq!(vault.load().unwrap(), records);
    }

    #[test]
    fn test_wrong_password_surfaces_not_empty() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path(), "correct");

        let mut records = BTreeMap::new();
        records.insert(
            "Wallet_1".to_string(),
            Note {
                body: "alpha".to_string(),
            },
        );
        vault.save(&records).unwrap();

        // Same salt file, different password
        let other = vault_in(dir.path(), "incorrect");
        assert!(matches!(other.load(), Err(Error::WrongPassword)));
    }

    #[test]
    fn test_update_is_persisted() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path(), "pw");

        vault
            .update(|records| {
                records.insert(
                    "Wallet_1".to_string(),
                    Note {
                        body: "alpha".to_string(),
                    },
                );
                Ok(())
            })
            .unwrap();

        assert_eq!(vault.load().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_update_does_not_persist() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path(), "pw");

        let result: Result<()> = vault.update(|records| {
            records.insert(
                "Wallet_1".to_string(),
                Note {
                    body: "alpha".to_string(),
                },
            );
            Err(Error::Validation("nope".to_string()))
        });

        assert!(result.is_err());
        assert!(vault.load().unwrap().is_empty());
    }

    #[test]
    fn test_no_plaintext_on_disk() {
        let dir = tempdir().unwrap();
        let vault = vault_in(dir.path(), "pw");

        let mut records = BTreeMap::new();
        records.insert(
            "Wallet_1".to_string(),
            Note {
                body: "supersecret".to_string(),
            },
        );
        vault.save(&records).unwrap();

        let raw = std::fs::read(dir.path().join("data.enc")).unwrap();
        let needle = b"supersecret";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }
}
