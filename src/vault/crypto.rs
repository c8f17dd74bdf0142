//! Password-based key derivation and vault sealing
//!
//! PBKDF2-HMAC-SHA256 stretches the storage password into a 32-byte key;
//! the vault blob is sealed with AES-256-GCM so a wrong key fails
//! authentication instead of yielding garbage.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::path::Path;

use crate::error::{Error, Result};

/// PBKDF2 iteration count. Changing this invalidates every existing vault.
pub const PBKDF2_ITERATIONS: u32 = 480_000;

/// Salt length persisted next to the vault file
pub const SALT_LEN: usize = 16;

const NONCE_LEN: usize = 12;

/// Derive the 32-byte vault key from a password and persisted salt.
///
/// Deterministic: same (password, salt) always yields the same key.
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Read the salt file, or create it with fresh random bytes on first use.
///
/// The salt is stored unencrypted; losing it makes the vault permanently
/// undecryptable even with the correct password.
pub fn load_or_create_salt(path: &Path) -> Result<[u8; SALT_LEN]> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        let salt: [u8; SALT_LEN] = bytes
            .try_into()
            .map_err(|_| Error::Vault(format!("salt file {} is not {} bytes", path.display(), SALT_LEN)))?;
        Ok(salt)
    } else {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        std::fs::write(path, salt)?;
        Ok(salt)
    }
}

/// Encrypt a plaintext blob under the derived key.
///
/// Layout: `[12-byte random nonce || ciphertext+tag]`. Encryption is
/// randomized, so equal plaintexts produce different blobs.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(key));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| Error::Vault(format!("encryption failed: {e:?}")))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a vault blob. Fails with `WrongPassword` on any authentication
/// failure - a wrong key and a tampered blob are indistinguishable here.
pub fn open(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(Error::WrongPassword);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::WrongPassword)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_derive_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let k1 = derive_key("hunter2", &salt);
        let k2 = derive_key("hunter2", &salt);
        assert_eq!(k1, k2);

        let k3 = derive_key("hunter3", &salt);
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let salt = [1u8; SALT_LEN];
        let key = derive_key("password", &salt);

        let blob = seal(&key, b"{\"Wallet_1\":{}}").unwrap();
        let plain = open(&key, &blob).unwrap();
        assert_eq!(plain, b"{\"Wallet_1\":{}}");
    }

    #[test]
    fn test_wrong_password_fails_authentication() {
        let salt = [1u8; SALT_LEN];
        let key = derive_key("password", &salt);
        let other = derive_key("Password", &salt);

        let blob = seal(&key, b"secret").unwrap();
        assert!(matches!(open(&other, &blob), Err(Error::WrongPassword)));
    }

    #[test]
    fn test_tampered_blob_fails() {
        let salt = [1u8; SALT_LEN];
        let key = derive_key("password", &salt);

        let mut blob = seal(&key, b"secret").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(open(&key, &blob), Err(Error::WrongPassword)));
    }

    #[test]
    fn test_salt_created_once_and_reused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("salt.key");

        let s1 = load_or_create_salt(&path).unwrap();
        let s2 = load_or_create_salt(&path).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(std::fs::read(&path).unwrap().len(), SALT_LEN);
    }

    #[test]
    fn test_truncated_salt_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("salt.key");
        std::fs::write(&path, [0u8; 7]).unwrap();

        assert!(load_or_create_salt(&path).is_err());
    }
}
