//! Encrypted wallet registry
//!
//! Wallet records are keyed `Wallet_<n>`; numbers are assigned in creation
//! order by scanning existing keys (max + 1), never kept as a separate
//! counter that could drift from the actual content.

use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};

use super::{BatchOutcome, SecretVault};

/// A stored wallet credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    /// 64 lowercase hex chars, no 0x prefix
    pub private_key: String,

    /// EIP-55 checksummed address derived from the key
    pub address: String,
}

/// Encrypted multi-wallet store
pub struct WalletVault {
    store: SecretVault<WalletRecord>,
}

impl WalletVault {
    /// Open the wallet vault, creating the salt file on first use.
    pub fn open(vault_path: &Path, salt_path: &Path, password: &str) -> Result<Self> {
        Ok(Self {
            store: SecretVault::open(vault_path, salt_path, password)?,
        })
    }

    /// Add a wallet from its private key, returning the assigned name.
    ///
    /// Accepts the key with or without a `0x` prefix. The address is derived
    /// from the key, never taken from input.
    pub fn add_wallet(&self, private_key: &str) -> Result<String> {
        let key = normalize_private_key(private_key)?;

        let signer: PrivateKeySigner = key
            .parse()
            .map_err(|_| Error::Validation("private key is not a valid secp256k1 scalar".to_string()))?;
        let address = signer.address().to_checksum(None);

        let name = self.store.update(|records| {
            let duplicate = records
                .values()
                .any(|r| r.address.eq_ignore_ascii_case(&address));
            if duplicate {
                return Err(Error::Duplicate(address.clone()));
            }

            let next = records.keys().filter_map(|k| wallet_number(k)).max().unwrap_or(0) + 1;
            let name = format!("Wallet_{next}");

            records.insert(
                name.clone(),
                WalletRecord {
                    private_key: key.clone(),
                    address: address.clone(),
                },
            );
            Ok(name)
        })?;

        info!("Added {} ({})", name, address);
        Ok(name)
    }

    /// Add several comma-separated private keys independently.
    ///
    /// Error messages carry only the last 8 characters of the offending key
    /// so full secrets never reach logs.
    pub fn bulk_add_wallets(&self, comma_separated_keys: &str) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for key in comma_separated_keys.split(',') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }

            match self.add_wallet(key) {
                Ok(_) => outcome.record_success(),
                Err(e) => {
                    outcome.record_failure(format!("key ...{}: {}", key_tail(key), e));
                }
            }
        }

        outcome
    }

    /// Look up a wallet by name, returning (private_key, address).
    pub fn get_wallet(&self, name: &str) -> Result<(String, String)> {
        let records = self.store.load()?;
        records
            .get(name)
            .map(|r| (r.private_key.clone(), r.address.clone()))
            .ok_or_else(|| Error::NotFound(format!("wallet {name}")))
    }

    /// Remove a single wallet by name.
    pub fn remove_wallet(&self, name: &str) -> Result<()> {
        self.store.update(|records| {
            records
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(format!("wallet {name}")))
        })?;

        info!("Removed {}", name);
        Ok(())
    }

    /// Remove wallets by selection (`"1-3,5,7-9"`).
    ///
    /// A malformed selection fails before anything is touched; a number
    /// with no matching wallet is a per-item error, not fatal to the batch.
    pub fn bulk_remove_wallets(&self, selection: &str) -> Result<BatchOutcome> {
        let numbers = super::selection::parse_selection(selection)?;

        self.store.update(|records| {
            let mut outcome = BatchOutcome::default();

            for number in numbers {
                let name = format!("Wallet_{number}");
                if records.remove(&name).is_some() {
                    outcome.record_success();
                } else {
                    outcome.record_failure(format!("no wallet numbered {number}"));
                }
            }

            Ok(outcome)
        })
    }

    /// List (name, address) pairs ordered by ascending wallet number.
    ///
    /// Names outside the `Wallet_<n>` pattern sort after all numbered
    /// entries, keeping the order total and deterministic.
    pub fn list_wallets(&self) -> Result<Vec<(String, String)>> {
        let records = self.store.load()?;

        let mut wallets: Vec<(String, String)> = records
            .into_iter()
            .map(|(name, r)| (name, r.address))
            .collect();
        wallets.sort_by(|(a, _), (b, _)| {
            let ka = wallet_number(a).unwrap_or(u32::MAX);
            let kb = wallet_number(b).unwrap_or(u32::MAX);
            ka.cmp(&kb).then_with(|| a.cmp(b))
        });

        Ok(wallets)
    }
}

/// Extract `n` from a `Wallet_<n>` name.
fn wallet_number(name: &str) -> Option<u32> {
    name.strip_prefix("Wallet_")?.parse().ok()
}

/// Strip an optional 0x prefix and require exactly 64 hex characters.
fn normalize_private_key(input: &str) -> Result<String> {
    let key = input.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);

    if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Validation(
            "private key must be exactly 64 hex characters".to_string(),
        ));
    }

    Ok(key.to_ascii_lowercase())
}

/// Last 8 characters of a key for log-safe error messages.
fn key_tail(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let start = chars.len().saturating_sub(8);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use tempfile::{tempdir, TempDir};

    // Address of private key 0x...01, a standard test vector
    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const ADDR_ONE: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";
    const KEY_TWO: &str = "0000000000000000000000000000000000000000000000000000000000000002";
    const KEY_THREE: &str = "0000000000000000000000000000000000000000000000000000000000000003";

    fn vault() -> (TempDir, WalletVault) {
        let dir = tempdir().unwrap();
        let vault = WalletVault::open(
            &dir.path().join("wallet_data.enc"),
            &dir.path().join("salt.key"),
            "pw",
        )
        .unwrap();
        (dir, vault)
    }

    #[test]
    fn test_add_derives_known_address() {
        let (_dir, vault) = vault();
        let name = vault.add_wallet(KEY_ONE).unwrap();
        assert_eq!(name, "Wallet_1");

        let (key, address) = vault.get_wallet("Wallet_1").unwrap();
        assert_eq!(key, KEY_ONE);
        assert!(address.eq_ignore_ascii_case(ADDR_ONE));
    }

    #[test]
    fn test_stored_address_is_checksummed() {
        let (_dir, vault) = vault();
        vault.add_wallet(KEY_ONE).unwrap();

        let (_, address) = vault.get_wallet("Wallet_1").unwrap();
        let parsed: Address = address.parse().unwrap();
        assert_eq!(parsed.to_checksum(None), address);
    }

    #[test]
    fn test_0x_prefix_is_equivalent() {
        let (_dir, vault) = vault();
        vault.add_wallet(&format!("0x{KEY_ONE}")).unwrap();

        // Same key without prefix is the same wallet
        let err = vault.add_wallet(KEY_ONE).unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[test]
    fn test_malformed_keys_rejected() {
        let (_dir, vault) = vault();
        assert!(matches!(
            vault.add_wallet("abc123"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            vault.add_wallet(&"g".repeat(64)),
            Err(Error::Validation(_))
        ));
        assert!(vault.list_wallets().unwrap().is_empty());
    }

    #[test]
    fn test_numbering_is_max_plus_one() {
        let (_dir, vault) = vault();
        vault.add_wallet(KEY_ONE).unwrap();
        vault.add_wallet(KEY_TWO).unwrap();
        vault.remove_wallet("Wallet_1").unwrap();

        // Max existing is 2, so the next number is 3 - 1 is not reused
        let name = vault.add_wallet(KEY_THREE).unwrap();
        assert_eq!(name, "Wallet_3");
    }

    #[test]
    fn test_bulk_add_isolates_failures() {
        let (_dir, vault) = vault();
        let keys = format!("{KEY_ONE}, not-a-key ,0x{KEY_TWO}");
        let outcome = vault.bulk_add_wallets(&keys);

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors.len(), 1);
        // Only the tail of the bad key may appear in the message
        assert!(outcome.errors[0].contains("...not-a-key") || outcome.errors[0].contains("ot-a-key"));
    }

    #[test]
    fn test_bulk_add_never_leaks_full_key() {
        let (_dir, vault) = vault();
        // 63 chars: fails validation, message must not contain the whole key
        let bad_key = "a".repeat(63);
        let outcome = vault.bulk_add_wallets(&bad_key);

        assert_eq!(outcome.failed, 1);
        assert!(!outcome.errors[0].contains(&bad_key));
    }

    #[test]
    fn test_bulk_remove_mixed_selection() {
        let (_dir, vault) = vault();
        vault.add_wallet(KEY_ONE).unwrap();
        vault.add_wallet(KEY_TWO).unwrap();
        vault.add_wallet(KEY_THREE).unwrap();

        let outcome = vault.bulk_remove_wallets("1-2,9").unwrap();
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);

        let remaining = vault.list_wallets().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, "Wallet_3");
    }

    #[test]
    fn test_bad_selection_leaves_vault_unmodified() {
        let (_dir, vault) = vault();
        vault.add_wallet(KEY_ONE).unwrap();

        assert!(matches!(
            vault.bulk_remove_wallets("abc"),
            Err(Error::Validation(_))
        ));
        assert_eq!(vault.list_wallets().unwrap().len(), 1);
    }

    #[test]
    fn test_list_orders_by_number() {
        let (_dir, vault) = vault();
        // Insert out of lexicographic order: Wallet_10 sorts after Wallet_2
        for key in [
            KEY_ONE, KEY_TWO, KEY_THREE,
            "0000000000000000000000000000000000000000000000000000000000000004",
            "0000000000000000000000000000000000000000000000000000000000000005",
            "0000000000000000000000000000000000000000000000000000000000000006",
            "0000000000000000000000000000000000000000000000000000000000000007",
            "0000000000000000000000000000000000000000000000000000000000000008",
            "0000000000000000000000000000000000000000000000000000000000000009",
            "000000000000000000000000000000000000000000000000000000000000000a",
        ] {
            vault.add_wallet(key).unwrap();
        }

        let names: Vec<String> = vault
            .list_wallets()
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names[1], "Wallet_2");
        assert_eq!(names[9], "Wallet_10");
    }
}
