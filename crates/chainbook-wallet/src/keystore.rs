//! Keystore file: on-disk persistence of the wallet signing key.
//!
//! The keystore is a small JSON document holding a format version, the
//! derived address, and the hex-encoded Ed25519 seed. On Unix the file
//! is written with mode 0600. The seed buffer is zeroized after use.
//!
//! [`KeystoreDetector`] adapts "a keystore file exists and parses" into
//! the client core's provider detection: a missing or unreadable
//! keystore answers "no provider", which the core treats as a normal
//! outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use chainbook_client::{ProviderDetector, ProviderHandle};
use chainbook_types::{Address, ChainbookError, Result};

use crate::signer::LocalWallet;

/// Current keystore file format version.
pub const KEYSTORE_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

/// Serialized keystore document.
#[derive(Serialize, Deserialize)]
struct KeystoreFile {
    /// Format version; readers reject unknown versions.
    version: u32,
    /// Derived address, stored for display without key material.
    address: Address,
    /// Hex-encoded 32-byte Ed25519 seed.
    secret_seed: String,
}

// ---------------------------------------------------------------------------
// Read / write
// ---------------------------------------------------------------------------

/// Writes `wallet` to a keystore file at `path`, creating parent
/// directories as needed.
pub fn write_keystore(path: &Path, wallet: &LocalWallet) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ChainbookError::KeystoreError {
            reason: format!("failed to create keystore directory: {e}"),
        })?;
    }

    let mut seed_hex = hex::encode(wallet.seed_bytes());
    let document = KeystoreFile {
        version: KEYSTORE_VERSION,
        address: wallet.address(),
        secret_seed: seed_hex.clone(),
    };

    let json =
        serde_json::to_string_pretty(&document).map_err(|e| ChainbookError::KeystoreError {
            reason: format!("failed to serialize keystore: {e}"),
        })?;
    seed_hex.zeroize();

    std::fs::write(path, json).map_err(|e| ChainbookError::KeystoreError {
        reason: format!("failed to write keystore file: {e}"),
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms).map_err(|e| ChainbookError::KeystoreError {
            reason: format!("failed to restrict keystore permissions: {e}"),
        })?;
    }

    tracing::info!(path = %path.display(), address = %wallet.address(), "keystore written");
    Ok(())
}

/// Reads the keystore at `path` and reconstructs the wallet.
///
/// # Errors
///
/// [`ChainbookError::KeystoreError`] for a missing or unreadable file,
/// an unknown format version, a malformed seed, or an address that
/// does not match the stored key.
pub fn read_keystore(path: &Path) -> Result<LocalWallet> {
    let json = std::fs::read_to_string(path).map_err(|e| ChainbookError::KeystoreError {
        reason: format!("failed to read keystore file: {e}"),
    })?;

    let document: KeystoreFile =
        serde_json::from_str(&json).map_err(|e| ChainbookError::KeystoreError {
            reason: format!("malformed keystore file: {e}"),
        })?;

    if document.version != KEYSTORE_VERSION {
        return Err(ChainbookError::KeystoreError {
            reason: format!(
                "unsupported keystore version {} (expected {KEYSTORE_VERSION})",
                document.version
            ),
        });
    }

    let mut seed_bytes = hex::decode(&document.secret_seed).map_err(|_| {
        ChainbookError::KeystoreError {
            reason: "seed is not valid hex".into(),
        }
    })?;
    if seed_bytes.len() != 32 {
        seed_bytes.zeroize();
        return Err(ChainbookError::KeystoreError {
            reason: format!("seed must be 32 bytes, got {}", seed_bytes.len()),
        });
    }

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&seed_bytes);
    seed_bytes.zeroize();

    let wallet = LocalWallet::from_seed(seed);
    seed.zeroize();

    if wallet.address() != document.address {
        return Err(ChainbookError::KeystoreError {
            reason: "stored address does not match the stored key".into(),
        });
    }

    Ok(wallet)
}

// ---------------------------------------------------------------------------
// KeystoreDetector
// ---------------------------------------------------------------------------

/// Provider detector backed by a keystore path.
pub struct KeystoreDetector {
    path: PathBuf,
}

impl KeystoreDetector {
    /// Creates a detector probing `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ProviderDetector for KeystoreDetector {
    async fn detect(&self) -> Option<ProviderHandle> {
        match read_keystore(&self.path) {
            Ok(wallet) => Some(Arc::new(wallet) as ProviderHandle),
            Err(error) => {
                tracing::debug!(
                    path = %self.path.display(),
                    %error,
                    "no usable keystore at path"
                );
                None
            }
        }
    }
}
